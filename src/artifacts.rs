// Каталог артефактов обученной модели. Для восстановления классификатора нужны все файлы:
//   config.json     - параметры обучения (длина последовательности, порог)
//   model.json      - архитектура энкодера и число меток
//   labels.json     - классы бинаризатора в порядке выходов модели
//   tokenizer.json  - токенизатор, с которым обучалась модель
//   model.mpk.gz    - веса, сохранённые CompactRecorder
//   metrics.csv     - итоги эпох

use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::{
    config::Config,
    module::Module,
    record::{CompactRecorder, Recorder},
    tensor::backend::Backend,
};

use crate::{
    data_processing::{BertMultilingualTokenizer, MultiLabelBinarizer},
    error::{Error, Result},
    model::{ClassifierConfig, RussianTextClassifier},
    training::TrainingConfig,
};

pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Создаёт каталог, если его ещё нет
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Открывает существующий каталог
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::Config(format!(
                "artifact directory `{}` does not exist, train the model first",
                dir.display()
            )));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn training_config_path(&self) -> PathBuf {
        self.dir.join("config.json")
    }

    pub fn model_config_path(&self) -> PathBuf {
        self.dir.join("model.json")
    }

    pub fn labels_path(&self) -> PathBuf {
        self.dir.join("labels.json")
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.dir.join("tokenizer.json")
    }

    // Расширение .mpk.gz добавляет recorder
    fn weights_path(&self) -> PathBuf {
        self.dir.join("model")
    }

    /// Всё, кроме весов: их сохраняет `save_model` после обучения
    pub fn save_setup(
        &self,
        config: &TrainingConfig,
        model_config: &ClassifierConfig,
        binarizer: &MultiLabelBinarizer,
        tokenizer: &BertMultilingualTokenizer,
    ) -> Result<()> {
        let path = self.training_config_path();
        config.save(&path).map_err(|e| Error::io(&path, e))?;

        let path = self.model_config_path();
        model_config.save(&path).map_err(|e| Error::io(&path, e))?;

        binarizer.save(self.labels_path())?;
        tokenizer.save(self.tokenizer_path())?;

        tracing::debug!(dir = %self.dir.display(), "model setup saved");
        Ok(())
    }

    pub fn save_model<B: Backend>(&self, model: &RussianTextClassifier<B>) -> Result<()> {
        let path = self.weights_path();
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .map_err(|e| Error::Record(format!("cannot save `{}`: {e:?}", path.display())))?;

        tracing::info!(path = %path.display(), "model weights saved");
        Ok(())
    }

    pub fn load_training_config(&self) -> Result<TrainingConfig> {
        let path = self.training_config_path();
        TrainingConfig::load(&path)
            .map_err(|e| Error::Config(format!("cannot read `{}`: {e:?}", path.display())))
    }

    pub fn load_model_config(&self) -> Result<ClassifierConfig> {
        let path = self.model_config_path();
        ClassifierConfig::load(&path)
            .map_err(|e| Error::Config(format!("cannot read `{}`: {e:?}", path.display())))
    }

    pub fn load_labels(&self) -> Result<MultiLabelBinarizer> {
        MultiLabelBinarizer::load(self.labels_path())
    }

    /// Токенизатор для инференса: дополнение до `pad_length`, обрезка после `truncate_at`
    pub fn load_tokenizer(
        &self,
        pad_length: usize,
        truncate_at: usize,
    ) -> Result<BertMultilingualTokenizer> {
        BertMultilingualTokenizer::from_file_with_limit(self.tokenizer_path(), pad_length, truncate_at)
    }

    /// Строит модель по конфигурации и загружает в неё сохранённые веса
    pub fn load_model<B: Backend>(
        &self,
        model_config: &ClassifierConfig,
        device: &B::Device,
    ) -> Result<RussianTextClassifier<B>> {
        let path = self.weights_path();
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .map_err(|e| Error::Record(format!("cannot load `{}`: {e:?}", path.display())))?;

        Ok(model_config.init::<B>(device).load_record(record))
    }
}
