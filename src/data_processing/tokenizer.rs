
// Данный модуль определяет трейт Tokenizer, общий интерфейс токенизаторов классификатора.
// Конкретная реализация BertMultilingualTokenizer использует предобученный WordPiece-токенизатор
// bert-base-multilingual-cased из библиотеки tokenizers. Каждый текст дополняется служебными
// токенами [CLS]/[SEP] и дополняется [PAD]. При обучении длина фиксирована, при инференсе
// длинные тексты обрезаются только по пределу позиций энкодера.

use std::path::Path;

use tokenizers::{PaddingParams, PaddingStrategy, TruncationParams};

use crate::error::{Error, Result};

/// Результат кодирования одного текста. Все векторы имеют одинаковую длину.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedText {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>, // 1 для настоящих токенов, 0 для заполнения
    pub token_type_ids: Vec<u32>,
}

impl EncodedText {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Дополняет последовательность токеном `pad_token` до длины `length`
    pub fn pad_to(&mut self, length: usize, pad_token: u32) {
        if self.len() < length {
            self.input_ids.resize(length, pad_token);
            self.attention_mask.resize(length, 0);
            self.token_type_ids.resize(length, 0);
        }
    }
}

pub trait Tokenizer: Send + Sync {
    /// Конвертирует текст в последовательность токенов.
    fn encode(&self, value: &str) -> Result<EncodedText>;

    /// Получает размер словаря токенизатора.
    fn vocab_size(&self) -> usize;

    /// Получает токен, используемый для заполнения последовательностей до одинаковой длины.
    fn pad_token(&self) -> u32;

    /// Минимальная длина закодированной последовательности: короткие тексты дополняются до неё.
    fn pad_length(&self) -> usize;
}

/// Токенизатор BERT. Короткие тексты дополняются до `pad_length`, длинные обрезаются
/// до `truncate_at`.
pub struct BertMultilingualTokenizer {
    tokenizer: tokenizers::Tokenizer,
    pad_token: u32,
    pad_length: usize,
    truncate_at: usize,
}

impl BertMultilingualTokenizer {
    pub const PAD: &'static str = "[PAD]";

    /// [CLS], хотя бы один токен текста и [SEP]
    pub const MIN_LENGTH: usize = 3;

    /// Дополнение и обрезка до одной и той же длины, как при обучении
    pub fn new(tokenizer: tokenizers::Tokenizer, max_length: usize) -> Result<Self> {
        Self::with_limit(tokenizer, max_length, max_length)
    }

    /// Дополнение до `pad_length`, обрезка только после `truncate_at` токенов
    pub fn with_limit(
        mut tokenizer: tokenizers::Tokenizer,
        pad_length: usize,
        truncate_at: usize,
    ) -> Result<Self> {
        if pad_length < Self::MIN_LENGTH {
            return Err(Error::Config(format!(
                "sequence length must be at least {}, got {pad_length}",
                Self::MIN_LENGTH
            )));
        }
        if truncate_at < pad_length {
            return Err(Error::Config(format!(
                "sequence length {pad_length} exceeds the encoder limit of {truncate_at} positions"
            )));
        }

        let pad_token = tokenizer
            .token_to_id(Self::PAD)
            .ok_or_else(|| Error::Tokenizer(format!("vocabulary has no {} token", Self::PAD)))?;

        tokenizer
            .with_padding(Some(PaddingParams {
                strategy: PaddingStrategy::Fixed(pad_length),
                pad_id: pad_token,
                pad_token: Self::PAD.to_string(),
                ..Default::default()
            }))
            .with_truncation(Some(TruncationParams {
                max_length: truncate_at,
                ..Default::default()
            }))
            .map_err(|e| Error::Tokenizer(e.to_string()))?;

        Ok(Self {
            tokenizer,
            pad_token,
            pad_length,
            truncate_at,
        })
    }

    fn read(path: &Path) -> Result<tokenizers::Tokenizer> {
        tokenizers::Tokenizer::from_file(path)
            .map_err(|e| Error::Tokenizer(format!("cannot load `{}`: {e}", path.display())))
    }

    /// Загружает `tokenizer.json`
    pub fn from_file(path: impl AsRef<Path>, max_length: usize) -> Result<Self> {
        Self::new(Self::read(path.as_ref())?, max_length)
    }

    /// Загружает `tokenizer.json` для инференса: обрезка по пределу позиций энкодера
    pub fn from_file_with_limit(
        path: impl AsRef<Path>,
        pad_length: usize,
        truncate_at: usize,
    ) -> Result<Self> {
        Self::with_limit(Self::read(path.as_ref())?, pad_length, truncate_at)
    }

    pub fn truncate_at(&self) -> usize {
        self.truncate_at
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.tokenizer
            .save(path, false)
            .map_err(|e| Error::Tokenizer(format!("cannot save `{}`: {e}", path.display())))
    }
}

impl Tokenizer for BertMultilingualTokenizer {
    fn encode(&self, value: &str) -> Result<EncodedText> {
        let encoding = self
            .tokenizer
            .encode(value, true)
            .map_err(|e| Error::Tokenizer(e.to_string()))?;

        Ok(EncodedText {
            input_ids: encoding.get_ids().to_vec(),
            attention_mask: encoding.get_attention_mask().to_vec(),
            token_type_ids: encoding.get_type_ids().to_vec(),
        })
    }

    fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(false)
    }

    fn pad_token(&self) -> u32 {
        self.pad_token
    }

    fn pad_length(&self) -> usize {
        self.pad_length
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    const VOCAB: [&str; 16] = [
        "[PAD]", "[UNK]", "[CLS]", "[SEP]", "привет", "мир", "жара", "июль", "пиво", "идиот",
        "убьют", "семью", ",", ".", "!", "день",
    ];

    /// Маленький WordPiece-токенизатор для тестов, без обращения к сети
    pub(crate) fn fixture_tokenizer() -> tokenizers::Tokenizer {
        let vocab: serde_json::Map<String, serde_json::Value> = VOCAB
            .iter()
            .enumerate()
            .map(|(id, token)| (token.to_string(), serde_json::json!(id)))
            .collect();
        let special = |id: usize| {
            serde_json::json!({
                "id": id, "content": VOCAB[id], "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            })
        };

        let json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [special(0), special(1), special(2), special(3)],
            "normalizer": null,
            "pre_tokenizer": { "type": "BertPreTokenizer" },
            "post_processor": {
                "type": "BertProcessing",
                "sep": ["[SEP]", 3],
                "cls": ["[CLS]", 2]
            },
            "decoder": null,
            "model": {
                "type": "WordPiece",
                "unk_token": "[UNK]",
                "continuing_subword_prefix": "##",
                "max_input_chars_per_word": 100,
                "vocab": vocab
            }
        });

        tokenizers::Tokenizer::from_str(&json.to_string()).unwrap()
    }

    pub(crate) fn test_tokenizer(max_length: usize) -> BertMultilingualTokenizer {
        BertMultilingualTokenizer::new(fixture_tokenizer(), max_length).unwrap()
    }

    #[test]
    fn pads_to_fixed_length() {
        let tokenizer = test_tokenizer(8);
        let encoded = tokenizer.encode("привет мир").unwrap();

        assert_eq!(encoded.input_ids, vec![2, 4, 5, 3, 0, 0, 0, 0]);
        assert_eq!(encoded.attention_mask, vec![1, 1, 1, 1, 0, 0, 0, 0]);
        assert_eq!(encoded.token_type_ids, vec![0; 8]);
    }

    #[test]
    fn truncates_but_keeps_special_tokens() {
        let tokenizer = test_tokenizer(4);
        let encoded = tokenizer.encode("жара июль пиво день").unwrap();

        assert_eq!(encoded.input_ids, vec![2, 6, 7, 3]);
        assert_eq!(encoded.attention_mask, vec![1; 4]);
    }

    #[test]
    fn unknown_words_map_to_unk() {
        let tokenizer = test_tokenizer(5);
        let encoded = tokenizer.encode("комары").unwrap();

        assert_eq!(encoded.input_ids, vec![2, 1, 3, 0, 0]);
        assert_eq!(tokenizer.pad_token(), 0);
        assert_eq!(tokenizer.vocab_size(), VOCAB.len());
    }

    #[test]
    fn saved_tokenizer_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        test_tokenizer(6).save(&path).unwrap();

        let reloaded = BertMultilingualTokenizer::from_file(&path, 6).unwrap();
        assert_eq!(
            reloaded.encode("пиво!").unwrap().input_ids,
            vec![2, 8, 14, 3, 0, 0]
        );
    }

    #[test]
    fn rejects_lengths_without_room_for_text() {
        for length in [0, 1, 2] {
            assert!(matches!(
                BertMultilingualTokenizer::new(fixture_tokenizer(), length),
                Err(Error::Config(_))
            ));
        }
        assert!(BertMultilingualTokenizer::new(fixture_tokenizer(), 3).is_ok());
    }

    #[test]
    fn limit_below_padding_is_rejected() {
        assert!(matches!(
            BertMultilingualTokenizer::with_limit(fixture_tokenizer(), 32, 16),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn long_texts_are_kept_up_to_the_limit() {
        let tokenizer = BertMultilingualTokenizer::with_limit(fixture_tokenizer(), 4, 16).unwrap();

        let long = tokenizer.encode("жара июль пиво день").unwrap();
        assert_eq!(long.input_ids, vec![2, 6, 7, 8, 15, 3]);

        let short = tokenizer.encode("пиво").unwrap();
        assert_eq!(short.input_ids, vec![2, 8, 3, 0]);
        assert_eq!(tokenizer.truncate_at(), 16);
    }

    #[test]
    fn pad_to_extends_all_columns() {
        let mut encoded = test_tokenizer(3).encode("пиво").unwrap();
        encoded.pad_to(5, 0);

        assert_eq!(encoded.input_ids, vec![2, 8, 3, 0, 0]);
        assert_eq!(encoded.attention_mask, vec![1, 1, 1, 0, 0]);
        assert_eq!(encoded.token_type_ids, vec![0; 5]);
    }
}
