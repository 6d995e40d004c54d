
// Модуль описывает метки датасета токсичных комментариев. ToxicityLabel перечисляет известные
// классы и их человекочитаемые вердикты, а MultiLabelBinarizer переводит наборы меток переменной
// длины в бинарные векторы фиксированной ширины и обратно.

use std::{collections::BTreeSet, fs, path::Path};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{EnumCount, EnumIter};

use crate::error::{Error, Result};

/// Перечисление известных классов датасета
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumCount, EnumIter)]
pub enum ToxicityLabel {
    Normal,
    Insult,
    Threat,
    Obscenity,
}

impl ToxicityLabel {
    /// Метка в том виде, в котором она записана в датасете
    pub fn tag(self) -> &'static str {
        match self {
            ToxicityLabel::Normal => "__label__NORMAL",
            ToxicityLabel::Insult => "__label__INSULT",
            ToxicityLabel::Threat => "__label__THREAT",
            ToxicityLabel::Obscenity => "__label__OBSCENITY",
        }
    }

    /// Текст вердикта для пользователя
    pub fn verdict(self) -> &'static str {
        match self {
            ToxicityLabel::Normal => "Норма",
            ToxicityLabel::Insult => "Оскорбление или нецензурная брань",
            ToxicityLabel::Threat => "Грозное преднамерение",
            ToxicityLabel::Obscenity => "Вульгарность",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::iter().find(|label| label.tag() == tag)
    }
}

/// Бинаризатор наборов меток. Классы хранятся в отсортированном порядке.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiLabelBinarizer {
    classes: Vec<String>,
}

impl MultiLabelBinarizer {
    /// Собирает словарь классов по всем наборам меток
    pub fn fit<S: AsRef<str>>(label_sets: &[Vec<S>]) -> Self {
        let classes: BTreeSet<String> = label_sets
            .iter()
            .flat_map(|labels| labels.iter().map(|label| label.as_ref().to_string()))
            .collect();

        Self {
            classes: classes.into_iter().collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Переводит набор меток в one-hot вектор
    pub fn transform<S: AsRef<str>>(&self, labels: &[S]) -> Vec<f32> {
        let mut row = vec![0.0; self.classes.len()];
        for label in labels {
            let label = label.as_ref();
            match self.classes.binary_search_by(|class| class.as_str().cmp(label)) {
                Ok(index) => row[index] = 1.0,
                Err(_) => tracing::warn!(label, "label was not seen while fitting, ignoring"),
            }
        }
        row
    }

    /// Возвращает метки, бит которых выставлен, в порядке классов
    pub fn inverse_transform(&self, mask: &[bool]) -> Vec<String> {
        self.classes
            .iter()
            .zip(mask)
            .filter(|(_, set)| **set)
            .map(|(class, _)| class.clone())
            .collect()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| Error::io(path, e))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(serde_json::from_str(&json)?)
    }
}
