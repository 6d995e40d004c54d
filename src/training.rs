// Данный модуль дообучает классификатор токсичности. Сначала датасет разбирается, метки
// бинаризуются, данные делятся на обучающую, валидационную и тестовую части. Затем с
// HuggingFace Hub загружаются токенизатор и веса энкодера, поверх энкодера ставится новая
// классификационная голова. Модель обучается оптимизатором AdamW, после каждой эпохи
// считаются потеря и поэлементная точность на валидации, в конце на тестовой части.
// Обученная модель, её конфигурация, метки и токенизатор сохраняются в каталог артефактов.

use std::{path::Path, sync::Arc};

use burn::{
    config::Config,
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    tensor::{
        activation::sigmoid,
        backend::{AutodiffBackend, Backend},
        ElementConversion,
    },
};

use crate::{
    artifacts::ArtifactStore,
    data_processing::{
        parse_dataset, preview_lines, train_val_test_split, BertMultilingualTokenizer,
        MultiLabelBinarizer,
        ToxicCommentDataset, ToxicityBatcher, ToxicityTrainingBatch, Tokenizer,
    },
    error::{Error, Result},
    metrics::{EpochMetrics, MetricsLogger, MultiLabelAccumulator},
    model::{
        pretrained::{load_encoder, PretrainedFiles},
        BertConfig, ClassifierConfig, RussianTextClassifier,
    },
    progress::progress_bar,
};

#[derive(Config)]
pub struct TrainingConfig {
    /// Идентификатор предобученной модели на HuggingFace Hub
    pub pretrained: String,
    #[config(default = 32)]
    pub max_seq_length: usize,
    #[config(default = 16)]
    pub batch_size: usize,
    #[config(default = 3)]
    pub num_epochs: usize,
    #[config(default = 1.0e-5)]
    pub learning_rate: f64,
    #[config(default = 1.0e-2)]
    pub weight_decay: f32,
    #[config(default = 0.3)]
    pub dropout: f64,
    /// Доля данных, откладываемая под валидацию и тест
    #[config(default = 0.3)]
    pub holdout_fraction: f64,
    #[config(default = 0.5)]
    pub threshold: f32,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 1)]
    pub num_workers: usize,
    /// Сколько разобранных записей показать в логе
    #[config(default = 30)]
    pub preview: usize,
}

impl TrainingConfig {
    /// Проверяет параметры, не зависящие от модели
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch size must be positive".into()));
        }
        if self.num_epochs == 0 {
            return Err(Error::Config("number of epochs must be positive".into()));
        }
        if !(self.holdout_fraction > 0.0 && self.holdout_fraction < 1.0) {
            return Err(Error::Config(format!(
                "holdout fraction must be in (0, 1), got {}",
                self.holdout_fraction
            )));
        }
        if self.max_seq_length < BertMultilingualTokenizer::MIN_LENGTH {
            return Err(Error::Config(format!(
                "max sequence length must be at least {}, got {}",
                BertMultilingualTokenizer::MIN_LENGTH,
                self.max_seq_length
            )));
        }
        Ok(())
    }

    /// Длина последовательности не может превышать таблицу позиций энкодера
    pub fn check_encoder(&self, bert: &BertConfig) -> Result<()> {
        if self.max_seq_length > bert.max_position_embeddings {
            return Err(Error::Config(format!(
                "max sequence length {} exceeds the encoder limit of {} positions",
                self.max_seq_length, bert.max_position_embeddings
            )));
        }
        Ok(())
    }
}

/// Итоги обучения
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub epochs: Vec<EpochMetrics>,
    pub test_loss: f64,
    pub test_accuracy: f64,
}

/// Полный цикл: данные, предобученная модель, обучение, сохранение артефактов
pub fn train<B: AutodiffBackend>(
    device: B::Device,    // Устройство для вычислений
    dataset_path: &Path,  // Файл с размеченными комментариями
    artifact_dir: &Path,  // Каталог для сохранения модели и конфигурации
    config: TrainingConfig,
) -> Result<TrainingReport> {
    config.validate()?;
    let store = ArtifactStore::create(artifact_dir)?;

    let records = parse_dataset(dataset_path)?;
    for line in preview_lines(&records, config.preview) {
        tracing::info!("{line}");
    }

    let label_sets: Vec<Vec<String>> = records.iter().map(|r| r.labels.clone()).collect();
    let binarizer = MultiLabelBinarizer::fit(&label_sets);
    tracing::info!(classes = ?binarizer.classes(), "labels binarized");

    let splits = train_val_test_split(records, config.holdout_fraction, config.seed)?;

    let files = PretrainedFiles::download(&config.pretrained)?;
    let (bert_config, bert_record) = load_encoder::<B>(&files, &device)?;
    config.check_encoder(&bert_config)?;
    let tokenizer = BertMultilingualTokenizer::from_file(&files.tokenizer, config.max_seq_length)?;

    let model_config = ClassifierConfig::new(bert_config, binarizer.num_classes())
        .with_dropout(config.dropout);
    let model = model_config.init_pretrained(bert_record, &device);
    store.save_setup(&config, &model_config, &binarizer, &tokenizer)?;

    let (model, report) = fit(
        model,
        Arc::new(tokenizer),
        ToxicCommentDataset::from_records(&splits.train, &binarizer),
        ToxicCommentDataset::from_records(&splits.valid, &binarizer),
        ToxicCommentDataset::from_records(&splits.test, &binarizer),
        &config,
        device,
        &MetricsLogger::new(store.dir())?,
    )?;

    store.save_model(&model)?;
    Ok(report)
}

/// Обучение уже собранной модели на готовых частях датасета
#[allow(clippy::too_many_arguments)]
pub fn fit<B: AutodiffBackend>(
    mut model: RussianTextClassifier<B>,
    tokenizer: Arc<dyn Tokenizer>,
    dataset_train: ToxicCommentDataset,
    dataset_valid: ToxicCommentDataset,
    dataset_test: ToxicCommentDataset,
    config: &TrainingConfig,
    device: B::Device,
    logger: &MetricsLogger,
) -> Result<(RussianTextClassifier<B>, TrainingReport)> {
    config.validate()?;

    let train_batches = dataset_train.len().div_ceil(config.batch_size);
    let valid_batches = dataset_valid.len().div_ceil(config.batch_size);
    let test_batches = dataset_test.len().div_ceil(config.batch_size);

    // Initialize batchers for training and validation data
    let batcher_train = ToxicityBatcher::<B>::new(tokenizer.clone(), device.clone());
    let batcher_valid = ToxicityBatcher::<B::InnerBackend>::new(tokenizer, device);

    let dataloader_train = DataLoaderBuilder::new(batcher_train)
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(dataset_train);

    let dataloader_valid = DataLoaderBuilder::new(batcher_valid.clone())
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(dataset_valid);

    let dataloader_test = DataLoaderBuilder::new(batcher_valid)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(dataset_test);

    let mut optim = AdamWConfig::new()
        .with_weight_decay(config.weight_decay)
        .with_epsilon(1.0e-8)
        .init();

    let mut epochs = Vec::with_capacity(config.num_epochs);
    for epoch in 1..=config.num_epochs {
        let mut train = MultiLabelAccumulator::new();
        let bar = progress_bar(train_batches, format!("Epoch {epoch}/{}", config.num_epochs));

        for batch in dataloader_train.iter() {
            let output = model.forward_classification(batch);
            train.add_loss(output.loss.clone().into_scalar().elem::<f64>());

            let grads = GradientsParams::from_grads(output.loss.backward(), &model);
            model = optim.step(config.learning_rate, model, grads);

            bar.set_message(format!(
                "Epoch {epoch}/{} loss {:.4}",
                config.num_epochs,
                train.loss()
            ));
            bar.inc(1);
        }
        bar.finish();

        let valid = evaluate(
            &model.valid(),
            dataloader_valid.as_ref(),
            config.threshold,
            valid_batches,
            "Validation",
        );

        let metrics = EpochMetrics {
            epoch,
            train_loss: train.loss(),
            valid_loss: valid.loss(),
            valid_accuracy: valid.accuracy(),
        };
        tracing::info!(
            epoch,
            train_loss = metrics.train_loss,
            valid_loss = metrics.valid_loss,
            valid_accuracy = metrics.valid_accuracy,
            "epoch finished"
        );
        logger.log(&metrics)?;
        epochs.push(metrics);
    }

    let test = evaluate(
        &model.valid(),
        dataloader_test.as_ref(),
        config.threshold,
        test_batches,
        "Test",
    );
    tracing::info!(
        test_loss = test.loss(),
        test_accuracy = test.accuracy(),
        "training finished"
    );

    let report = TrainingReport {
        epochs,
        test_loss: test.loss(),
        test_accuracy: test.accuracy(),
    };
    Ok((model, report))
}

/// Проход по данным без градиентов: средняя потеря и поэлементная точность
pub fn evaluate<B: Backend>(
    model: &RussianTextClassifier<B>,
    dataloader: &dyn DataLoader<ToxicityTrainingBatch<B>>,
    threshold: f32,
    num_batches: usize,
    message: &'static str,
) -> MultiLabelAccumulator {
    let mut acc = MultiLabelAccumulator::new();
    let bar = progress_bar(num_batches, message);

    for batch in dataloader.iter() {
        let output = model.forward_classification(batch);
        acc.add_loss(output.loss.into_scalar().elem::<f64>());

        let probabilities = sigmoid(output.logits).into_data().convert::<f32>().value;
        let targets = output.targets.into_data().convert::<f32>().value;
        acc.add_predictions(&probabilities, &targets, threshold);
        bar.inc(1);
    }
    bar.finish();

    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_processing::{tokenizer::tests::test_tokenizer, LabeledComment};
    use crate::model::bert::tests::tiny_config;
    use burn::backend::{Autodiff, NdArray};

    type TestAutodiffBackend = Autodiff<NdArray>;

    fn records() -> Vec<LabeledComment> {
        [
            ("__label__NORMAL", "привет мир"),
            ("__label__NORMAL", "жара , июль , пиво"),
            ("__label__INSULT", "идиот !"),
            ("__label__THREAT", "убьют семью"),
            ("__label__NORMAL", "день ."),
            ("__label__INSULT", "идиот , идиот"),
        ]
        .into_iter()
        .map(|(label, text)| LabeledComment::new(vec![label.to_string()], text.to_string()))
        .collect()
    }

    #[test]
    fn default_config_matches_fine_tuning_setup() {
        let config = TrainingConfig::new("bert-base-multilingual-cased".into());
        assert_eq!(config.max_seq_length, 32);
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.num_epochs, 3);
        assert_eq!(config.learning_rate, 1.0e-5);
        assert_eq!(config.dropout, 0.3);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn train_rejects_invalid_holdout_fraction() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainingConfig::new("unused".into()).with_holdout_fraction(1.5);

        let result = train::<TestAutodiffBackend>(
            Default::default(),
            &dir.path().join("dataset.txt"),
            dir.path(),
            config,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn fit_reports_every_epoch_and_writes_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let records = records();
        let label_sets: Vec<Vec<String>> = records.iter().map(|r| r.labels.clone()).collect();
        let binarizer = MultiLabelBinarizer::fit(&label_sets);
        let dataset = || ToxicCommentDataset::from_records(&records, &binarizer);

        let config = TrainingConfig::new("tiny".into())
            .with_max_seq_length(8)
            .with_batch_size(4)
            .with_num_epochs(2)
            .with_learning_rate(1.0e-2);
        let model = ClassifierConfig::new(tiny_config(), binarizer.num_classes())
            .with_dropout(0.0)
            .init::<TestAutodiffBackend>(&device);
        let logger = MetricsLogger::new(dir.path()).unwrap();

        let (_, report) = fit(
            model,
            Arc::new(test_tokenizer(8)),
            dataset(),
            dataset(),
            dataset(),
            &config,
            device,
            &logger,
        )
        .unwrap();

        assert_eq!(report.epochs.len(), 2);
        assert!(report.epochs.iter().all(|m| m.train_loss.is_finite()));
        assert!((0.0..=100.0).contains(&report.test_accuracy));
        assert!(report.test_loss.is_finite());

        let csv = std::fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn invalid_loop_settings_are_rejected() {
        let base = || TrainingConfig::new("tiny".into());

        for config in [
            base().with_batch_size(0),
            base().with_num_epochs(0),
            base().with_holdout_fraction(0.0),
            base().with_max_seq_length(2),
        ] {
            assert!(matches!(config.validate(), Err(Error::Config(_))));
        }
        assert!(base().validate().is_ok());
    }

    #[test]
    fn sequence_length_must_fit_encoder_positions() {
        let config = TrainingConfig::new("tiny".into());
        assert!(config.check_encoder(&tiny_config()).is_err());
        assert!(config.with_max_seq_length(16).check_encoder(&tiny_config()).is_ok());

        let multilingual = BertConfig::new(119547, 768, 12, 12, 3072, 512);
        let too_long = TrainingConfig::new("tiny".into()).with_max_seq_length(600);
        assert!(matches!(too_long.check_encoder(&multilingual), Err(Error::Config(_))));
    }

    #[test]
    fn fit_refuses_zero_batch_size() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let records = records();
        let label_sets: Vec<Vec<String>> = records.iter().map(|r| r.labels.clone()).collect();
        let binarizer = MultiLabelBinarizer::fit(&label_sets);
        let dataset = || ToxicCommentDataset::from_records(&records, &binarizer);

        let model = ClassifierConfig::new(tiny_config(), binarizer.num_classes())
            .init::<TestAutodiffBackend>(&device);
        let result = fit(
            model,
            Arc::new(test_tokenizer(8)),
            dataset(),
            dataset(),
            dataset(),
            &TrainingConfig::new("tiny".into()).with_batch_size(0),
            device,
            &MetricsLogger::new(dir.path()).unwrap(),
        );

        assert!(matches!(result, Err(Error::Config(_))));
    }
}
