
// Модуль отвечает за чтение датасета токсичных комментариев. Каждая строка файла имеет вид
// `__label__INSULT,__label__THREAT текст комментария`: сначала идут метки через запятую, затем
// через пробел сам комментарий. Эмодзи в тексте заменяются на их текстовые названия.
// ToxicCommentDataset оборачивает разобранные и бинаризованные записи в датасет Burn.

use std::{
    fs,
    path::Path,
    sync::OnceLock,
};

use burn::data::dataset::{Dataset, InMemDataset};
use derive_new::new;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use super::labels::MultiLabelBinarizer;
use crate::{
    error::{Error, Result},
    progress::progress_bar,
};

/// Разобранная строка датасета
#[derive(new, Clone, Debug, PartialEq, Eq)]
pub struct LabeledComment {
    pub labels: Vec<String>, // Метки в исходном виде (`__label__...`)
    pub text: String,        // Текст комментария
}

// Структура для элементов мульти-лейбл классификации
#[derive(new, Clone, Debug)]
pub struct ToxicCommentItem {
    pub text: String,     // Текст для классификации
    pub labels: Vec<f32>, // Бинарный вектор меток
}

fn line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^((?:__label__[A-Z_]+,?)+)\s(.+)").expect("dataset line pattern is valid")
    })
}

/// Название эмодзи в виде одного слова: `flag: Russia` -> `Russia`,
/// `woman: red hair` -> `woman_red_hair`
fn emoji_alias(name: &str) -> String {
    let name = name.strip_prefix("flag: ").unwrap_or(name);
    name.split_whitespace()
        .map(|word| word.trim_matches(|c| c == ':' || c == ','))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Заменяет каждый эмодзи на `:его_название:`
pub fn demojize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for grapheme in text.graphemes(true) {
        match emojis::get(grapheme) {
            Some(emoji) => {
                out.push(':');
                out.push_str(&emoji_alias(emoji.name()));
                out.push(':');
            }
            None => out.push_str(grapheme),
        }
    }
    out
}

/// Разбирает одну строку. Строки, не подходящие под формат, пропускаются.
pub fn parse_line(line: &str) -> Option<LabeledComment> {
    let captures = line_pattern().captures(line)?;
    let labels = captures[1]
        .split(',')
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect();
    let text = demojize(&captures[2]);

    Some(LabeledComment::new(labels, text))
}

/// Читает файл датасета целиком
pub fn parse_dataset(path: impl AsRef<Path>) -> Result<Vec<LabeledComment>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let lines: Vec<&str> = content.lines().collect();

    let bar = progress_bar(lines.len(), "Parsing dataset");
    let mut records = Vec::with_capacity(lines.len());
    for (number, line) in lines.iter().enumerate() {
        match parse_line(line) {
            Some(record) => records.push(record),
            None => tracing::debug!(line = number + 1, "skipping malformed dataset line"),
        }
        bar.inc(1);
    }
    bar.finish();

    if records.is_empty() {
        return Err(Error::EmptyDataset(path.to_path_buf()));
    }

    tracing::info!(
        path = %path.display(),
        records = records.len(),
        skipped = lines.len() - records.len(),
        "dataset parsed"
    );
    Ok(records)
}

/// Строки для предпросмотра первых `count` записей
pub fn preview_lines(records: &[LabeledComment], count: usize) -> Vec<String> {
    records
        .iter()
        .take(count)
        .map(|record| format!("{} {}", record.labels.join(","), record.text))
        .collect()
}

/// Перемешивает элементы и откладывает `ceil(len * fraction)` из них во вторую часть
pub fn holdout_split<T>(mut items: Vec<T>, fraction: f64, rng: &mut StdRng) -> (Vec<T>, Vec<T>) {
    items.shuffle(rng);
    let holdout = ((items.len() as f64) * fraction).ceil() as usize;
    let keep = items.len() - holdout.min(items.len());
    let rest = items.split_off(keep);
    (items, rest)
}

/// Три части датасета
#[derive(Debug)]
pub struct DatasetSplits<T> {
    pub train: Vec<T>,
    pub valid: Vec<T>,
    pub test: Vec<T>,
}

/// Делит данные на обучающую, валидационную и тестовую части. Отложенная часть
/// (`holdout_fraction`) делится пополам между валидацией и тестом. Ни одна часть не
/// может остаться пустой.
pub fn train_val_test_split<T>(
    items: Vec<T>,
    holdout_fraction: f64,
    seed: u64,
) -> Result<DatasetSplits<T>> {
    let total = items.len();
    let mut rng = StdRng::seed_from_u64(seed);
    let (train, holdout) = holdout_split(items, holdout_fraction, &mut rng);
    let (valid, test) = holdout_split(holdout, 0.5, &mut rng);

    for (split, len) in [("train", train.len()), ("validation", valid.len()), ("test", test.len())] {
        if len == 0 {
            return Err(Error::EmptySplit { split, total });
        }
    }

    tracing::info!(
        train = train.len(),
        valid = valid.len(),
        test = test.len(),
        "dataset split"
    );
    Ok(DatasetSplits { train, valid, test })
}

/// Датасет Burn поверх бинаризованных комментариев
pub struct ToxicCommentDataset {
    dataset: InMemDataset<ToxicCommentItem>,
}

impl ToxicCommentDataset {
    pub fn from_records(records: &[LabeledComment], binarizer: &MultiLabelBinarizer) -> Self {
        let items = records
            .iter()
            .map(|record| ToxicCommentItem::new(record.text.clone(), binarizer.transform(&record.labels)))
            .collect();
        Self {
            dataset: InMemDataset::new(items),
        }
    }
}

impl Dataset<ToxicCommentItem> for ToxicCommentDataset {
    /// Возвращает элемент набора данных по индексу
    fn get(&self, index: usize) -> Option<ToxicCommentItem> {
        self.dataset.get(index)
    }

    /// Возвращает количество элементов в наборе данных
    fn len(&self) -> usize {
        self.dataset.len()
    }
}
