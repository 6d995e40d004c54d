
// Модуль определяет две структуры ToxicityTrainingBatch и ToxicityInferenceBatch для обработки
// пакетов данных во время обучения и вывода соответственно. Структура ToxicityBatcher реализована
// для создания этих пакетов. Она параметризована типом B: Backend для поддержки различных
// вычислительных бэкэндов (например, CPU, CUDA).

// Для обучения элементы являются экземплярами ToxicCommentItem и включают текст и бинарный вектор
// меток. Для вывода элементы просто являются строками без меток. Тексты токенизируются и
// дополняются до самой длинной строки пакета, маска заполнения строится по attention mask.

use super::{
    dataset::ToxicCommentItem,
    tokenizer::{EncodedText, Tokenizer},
};
use burn::{
    data::dataloader::batcher::Batcher,
    tensor::{backend::Backend, Bool, Data, Int, Shape, Tensor},
};
use derive_new::new;
use std::sync::Arc;

use crate::error::Result;

/// Структура для упаковки комментариев в пакеты
#[derive(Clone, new)]
pub struct ToxicityBatcher<B: Backend> {
    tokenizer: Arc<dyn Tokenizer>, // Токенизатор для конвертации текста в токены
    device: B::Device,             // Вычислительное устройство для создания тензоров
}

/// Структура для обучающего пакета
#[derive(Debug, Clone, new)]
pub struct ToxicityTrainingBatch<B: Backend> {
    pub input_ids: Tensor<B, 2, Int>,      // Токенизированный текст
    pub token_type_ids: Tensor<B, 2, Int>, // Номера сегментов (всегда 0 для одного текста)
    pub mask_pad: Tensor<B, 2, Bool>,      // true на позициях заполнения
    pub labels: Tensor<B, 2>,              // Бинарные векторы меток
}

/// Структура для пакета инференса
#[derive(Debug, Clone, new)]
pub struct ToxicityInferenceBatch<B: Backend> {
    pub input_ids: Tensor<B, 2, Int>,
    pub token_type_ids: Tensor<B, 2, Int>,
    pub mask_pad: Tensor<B, 2, Bool>,
}

impl<B: Backend> ToxicityBatcher<B> {
    fn int_tensor(
        &self,
        rows: &[EncodedText],
        seq_length: usize,
        column: fn(&EncodedText) -> &[u32],
    ) -> Tensor<B, 2, Int> {
        let values: Vec<i64> = rows
            .iter()
            .flat_map(|row| column(row).iter().map(|&value| value as i64))
            .collect();

        Tensor::from_data(
            Data::new(values, Shape::new([rows.len(), seq_length])).convert(),
            &self.device,
        )
    }

    /// Токенизирует тексты и собирает тензоры идентификаторов и маски. Строки дополняются
    /// до самой длинной в пакете.
    fn encode_texts<'a>(
        &self,
        texts: impl Iterator<Item = &'a str>,
    ) -> Result<(Tensor<B, 2, Int>, Tensor<B, 2, Int>, Tensor<B, 2, Bool>)> {
        let mut rows = texts
            .map(|text| self.tokenizer.encode(text))
            .collect::<Result<Vec<EncodedText>>>()?;

        let seq_length = rows
            .iter()
            .map(EncodedText::len)
            .max()
            .unwrap_or_else(|| self.tokenizer.pad_length());
        for row in rows.iter_mut() {
            row.pad_to(seq_length, self.tokenizer.pad_token());
        }

        let input_ids = self.int_tensor(&rows, seq_length, |row| row.input_ids.as_slice());
        let token_type_ids = self.int_tensor(&rows, seq_length, |row| row.token_type_ids.as_slice());
        let mask_pad = self
            .int_tensor(&rows, seq_length, |row| row.attention_mask.as_slice())
            .equal_elem(0);

        Ok((input_ids, token_type_ids, mask_pad))
    }

    /// Обучающий пакет. Ошибка токенизатора возвращается вызывающему.
    pub fn training_batch(&self, items: &[ToxicCommentItem]) -> Result<ToxicityTrainingBatch<B>> {
        let (input_ids, token_type_ids, mask_pad) =
            self.encode_texts(items.iter().map(|item| item.text.as_str()))?;

        let num_labels = items.first().map_or(0, |item| item.labels.len());
        let labels: Vec<f32> = items
            .iter()
            .flat_map(|item| item.labels.iter().copied())
            .collect();
        let labels = Tensor::from_data(
            Data::new(labels, Shape::new([items.len(), num_labels])).convert(),
            &self.device,
        );

        Ok(ToxicityTrainingBatch::new(input_ids, token_type_ids, mask_pad, labels))
    }

    /// Пакет для инференса. Ошибка токенизатора возвращается вызывающему.
    pub fn inference_batch(&self, texts: &[String]) -> Result<ToxicityInferenceBatch<B>> {
        let (input_ids, token_type_ids, mask_pad) =
            self.encode_texts(texts.iter().map(String::as_str))?;

        Ok(ToxicityInferenceBatch::new(input_ids, token_type_ids, mask_pad))
    }
}

// Трейт Batcher не умеет возвращать ошибку. Длины проверяются при создании токенизатора,
// поэтому сбой здесь означает испорченный токенизатор, и загрузчик данных останавливается.

/// Реализация Batcher для обучения
impl<B: Backend> Batcher<ToxicCommentItem, ToxicityTrainingBatch<B>> for ToxicityBatcher<B> {
    fn batch(&self, items: Vec<ToxicCommentItem>) -> ToxicityTrainingBatch<B> {
        self.training_batch(&items)
            .unwrap_or_else(|err| panic!("cannot build a training batch: {err}"))
    }
}

/// Реализация Batcher для инференса
impl<B: Backend> Batcher<String, ToxicityInferenceBatch<B>> for ToxicityBatcher<B> {
    fn batch(&self, items: Vec<String>) -> ToxicityInferenceBatch<B> {
        self.inference_batch(&items)
            .unwrap_or_else(|err| panic!("cannot build an inference batch: {err}"))
    }
}
