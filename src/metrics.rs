
// Метрики мульти-лейбл классификации. Точность считается поэлементно: каждая ячейка
// [пример, метка] сравнивается с порогом отдельно. Итоги эпох пишутся в metrics.csv.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

/// Накопитель потерь и поэлементной точности за один проход по данным
#[derive(Debug, Default, Clone)]
pub struct MultiLabelAccumulator {
    loss_sum: f64,
    batches: usize,
    correct: usize,
    total: usize,
}

impl MultiLabelAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_loss(&mut self, loss: f64) {
        self.loss_sum += loss;
        self.batches += 1;
    }

    /// `probabilities` и `targets` - развёрнутые матрицы одинакового размера
    pub fn add_predictions(&mut self, probabilities: &[f32], targets: &[f32], threshold: f32) {
        self.correct += probabilities
            .iter()
            .zip(targets)
            .filter(|&(&p, &t)| (p > threshold) == (t > 0.5))
            .count();
        self.total += targets.len();
    }

    /// Средняя потеря на пакет
    pub fn loss(&self) -> f64 {
        if self.batches == 0 {
            f64::NAN
        } else {
            self.loss_sum / self.batches as f64
        }
    }

    /// Доля верно предсказанных ячеек, в процентах
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.correct as f64 / self.total as f64
        }
    }
}

/// Итоги одной эпохи
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub valid_loss: f64,
    pub valid_accuracy: f64,
}

/// Пишет итоги эпох в CSV. Каждый запуск обучения начинает файл заново.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let csv_path = dir.join("metrics.csv");
        fs::write(&csv_path, "epoch,train_loss,valid_loss,valid_accuracy\n")
            .map_err(|e| Error::io(&csv_path, e))?;
        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .map_err(|e| Error::io(&self.csv_path, e))?;

        writeln!(
            file,
            "{},{:.6},{:.6},{:.4}",
            m.epoch, m.train_loss, m.valid_loss, m.valid_accuracy
        )
        .map_err(|e| Error::io(&self.csv_path, e))
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_counts_every_label_cell() {
        let mut acc = MultiLabelAccumulator::new();
        acc.add_predictions(&[0.9, 0.1, 0.6, 0.4], &[1.0, 0.0, 0.0, 0.0], 0.5);
        acc.add_predictions(&[0.2, 0.7], &[0.0, 1.0], 0.5);

        assert!((acc.accuracy() - 100.0 * 5.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn threshold_is_strict() {
        let mut acc = MultiLabelAccumulator::new();
        acc.add_predictions(&[0.5], &[1.0], 0.5);
        assert_eq!(acc.accuracy(), 0.0);
    }

    #[test]
    fn loss_is_averaged_over_batches() {
        let mut acc = MultiLabelAccumulator::new();
        assert!(acc.loss().is_nan());
        acc.add_loss(0.5);
        acc.add_loss(0.25);
        assert!((acc.loss() - 0.375).abs() < 1e-12);
    }

    #[test]
    fn csv_gets_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger
            .log(&EpochMetrics {
                epoch: 1,
                train_loss: 0.5,
                valid_loss: 0.25,
                valid_accuracy: 97.5,
            })
            .unwrap();

        let content = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "epoch,train_loss,valid_loss,valid_accuracy");
        assert_eq!(lines[1], "1,0.500000,0.250000,97.5000");
    }

    #[test]
    fn new_run_starts_a_fresh_csv() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = EpochMetrics {
            epoch: 1,
            train_loss: 0.5,
            valid_loss: 0.25,
            valid_accuracy: 97.5,
        };
        MetricsLogger::new(dir.path()).unwrap().log(&metrics).unwrap();

        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&EpochMetrics { epoch: 2, ..metrics }).unwrap();

        let content = fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(
            content,
            "epoch,train_loss,valid_loss,valid_accuracy\n2,0.500000,0.250000,97.5000\n"
        );
    }
}
