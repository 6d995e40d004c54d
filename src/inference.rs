// Данный модуль восстанавливает обученный классификатор из каталога артефактов и применяет
// его к текстам. Вероятности меток сравниваются с порогом, прошедшие порог метки переводятся
// обратно в названия через бинаризатор, а затем в строку вердикта.

use std::{path::Path, sync::Arc};

use burn::tensor::backend::Backend;

use crate::{
    artifacts::ArtifactStore,
    data_processing::{MultiLabelBinarizer, ToxicityBatcher},
    error::Result,
    model::RussianTextClassifier,
    verdict::verdict,
};

/// Предсказание для одного текста
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub labels: Vec<String>,     // Метки выше порога, в порядке классов
    pub probabilities: Vec<f32>, // Вероятность каждого класса
}

pub struct ToxicityClassifier<B: Backend> {
    model: RussianTextClassifier<B>,
    batcher: ToxicityBatcher<B>,
    binarizer: MultiLabelBinarizer,
    threshold: f32,
}

impl<B: Backend> ToxicityClassifier<B> {
    pub fn new(
        model: RussianTextClassifier<B>,
        batcher: ToxicityBatcher<B>,
        binarizer: MultiLabelBinarizer,
        threshold: f32,
    ) -> Self {
        Self {
            model,
            batcher,
            binarizer,
            threshold,
        }
    }

    /// Загружает модель, токенизатор и метки из каталога артефактов
    pub fn load(artifact_dir: impl AsRef<Path>, device: B::Device) -> Result<Self> {
        let store = ArtifactStore::open(artifact_dir)?;

        // Load experiment configuration
        let config = store.load_training_config()?;
        let model_config = store.load_model_config()?;
        let binarizer = store.load_labels()?;
        // Длинные тексты обрезаются только по пределу позиций энкодера
        let tokenizer =
            store.load_tokenizer(config.max_seq_length, model_config.bert.max_position_embeddings)?;

        tracing::info!(dir = %store.dir().display(), "loading trained weights");
        let model = store.load_model::<B>(&model_config, &device)?;

        Ok(Self::new(
            model,
            ToxicityBatcher::new(Arc::new(tokenizer), device),
            binarizer,
            config.threshold,
        ))
    }

    pub fn classes(&self) -> &[String] {
        self.binarizer.classes()
    }

    pub fn predict(&self, texts: &[String]) -> Result<Vec<Prediction>> {
        let num_classes = self.binarizer.num_classes();
        if texts.is_empty() || num_classes == 0 {
            return Ok(Vec::new());
        }

        let probabilities = self.model.infer(self.batcher.inference_batch(texts)?);
        let values = probabilities.into_data().convert::<f32>().value;

        let predictions = values
            .chunks(num_classes)
            .map(|row| {
                let mask: Vec<bool> = row.iter().map(|&p| p > self.threshold).collect();
                Prediction {
                    labels: self.binarizer.inverse_transform(&mask),
                    probabilities: row.to_vec(),
                }
            })
            .collect();
        Ok(predictions)
    }

    /// Строка вердикта для одного текста
    pub fn check(&self, text: &str) -> Result<String> {
        let labels = self
            .predict(&[text.to_string()])?
            .pop()
            .map(|prediction| prediction.labels)
            .unwrap_or_default();

        tracing::debug!(text, ?labels, "classified");
        Ok(verdict(&labels))
    }
}

/// Печатает вердикты для набора текстов
pub fn infer<B: Backend>(
    device: B::Device,    // Устройство для вычислений
    artifact_dir: &Path,  // Каталог с моделью и конфигурацией
    samples: Vec<String>, // Тексты для классификации
) -> Result<()> {
    let classifier = ToxicityClassifier::<B>::load(artifact_dir, device)?;
    let predictions = classifier.predict(&samples)?;

    for (i, (text, prediction)) in samples.iter().zip(predictions).enumerate() {
        let scores: Vec<String> = classifier
            .classes()
            .iter()
            .zip(&prediction.probabilities)
            .map(|(class, p)| format!("{class}={p:.3}"))
            .collect();

        println!(
            "\n=== Item {i} ===\n- Text: {text}\n- Probabilities: {}\n- {}\n================",
            scores.join(" "),
            verdict(&prediction.labels)
        );
    }
    Ok(())
}
