// Интерфейс командной строки: обучение, проверка текстов и демонстрация на примерах.

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ru_toxic::{
    inference::{self, ToxicityClassifier},
    model::pretrained::DEFAULT_MODEL,
    training::{self, TrainingConfig},
};

use crate::backend::{self, Backend, TrainBackend};

/// Комментарии для демонстрации. Примеры с нецензурной бранью сюда не включены.
const DEMO_SAMPLES: [&str; 7] = [
    "Ой, Васька, во дает, вот он идиот...",
    "Сегодня был довольно жаркий день",
    "Жара, июль, комары, пиво",
    "На кол бы посадить твоего мужа",
    "Мои людью убьют всю твою семью",
    "опять эти дауны зумеры, опять херни натворили",
    "https://natali37.ru/product/11320 50 размер блузка агния 270 руб. 1 шт",
];

#[derive(Parser, Debug)]
#[command(
    name = "ru-toxic",
    version,
    about = "Multi-label toxicity classifier for Russian comments"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Дообучить модель на размеченном датасете
    Train(TrainArgs),
    /// Вывести вердикт для текстов (без аргументов текст читается из stdin)
    Check(CheckArgs),
    /// Вывести вердикты для встроенных примеров
    Demo(ArtifactArgs),
}

#[derive(Args, Debug)]
struct ArtifactArgs {
    /// Каталог с артефактами обученной модели
    #[arg(long, default_value = "artifacts")]
    artifact_dir: PathBuf,
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Файл со строками вида `__label__INSULT,__label__THREAT текст`
    #[arg(long)]
    dataset: PathBuf,

    #[command(flatten)]
    artifacts: ArtifactArgs,

    /// Предобученная модель на HuggingFace Hub
    #[arg(long, default_value = DEFAULT_MODEL)]
    pretrained: String,

    #[arg(long, default_value_t = 3)]
    epochs: usize,

    #[arg(long, default_value_t = 16)]
    batch_size: usize,

    #[arg(long, default_value_t = 32)]
    max_seq_length: usize,

    #[arg(long, default_value_t = 1.0e-5)]
    learning_rate: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Сколько записей датасета показать в логе
    #[arg(long, default_value_t = 30)]
    preview: usize,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[command(flatten)]
    artifacts: ArtifactArgs,

    /// Тексты для проверки
    texts: Vec<String>,
}

impl From<&TrainArgs> for TrainingConfig {
    fn from(args: &TrainArgs) -> Self {
        TrainingConfig::new(args.pretrained.clone())
            .with_num_epochs(args.epochs)
            .with_batch_size(args.batch_size)
            .with_max_seq_length(args.max_seq_length)
            .with_learning_rate(args.learning_rate)
            .with_seed(args.seed)
            .with_preview(args.preview)
    }
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Command::Train(args) => run_train(args),
            Command::Check(args) => run_check(args),
            Command::Demo(args) => run_demo(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    let report = training::train::<TrainBackend>(
        backend::device(),
        &args.dataset,
        &args.artifacts.artifact_dir,
        TrainingConfig::from(&args),
    )
    .context("training failed")?;

    for m in &report.epochs {
        println!(
            "Epoch {} | train_loss={:.4} | valid_loss={:.4} | valid_accuracy={:.2}%",
            m.epoch, m.train_loss, m.valid_loss, m.valid_accuracy
        );
    }
    println!(
        "Test | loss={:.4} | accuracy={:.2}%",
        report.test_loss, report.test_accuracy
    );
    Ok(())
}

fn run_check(args: CheckArgs) -> Result<()> {
    let texts = if args.texts.is_empty() {
        vec![read_prompt("Входной текст: ")?]
    } else {
        args.texts
    };

    let classifier = ToxicityClassifier::<Backend>::load(&args.artifacts.artifact_dir, backend::device())
        .context("cannot load the trained model")?;
    for text in &texts {
        println!("{}", classifier.check(text)?);
    }
    Ok(())
}

fn run_demo(args: ArtifactArgs) -> Result<()> {
    let samples = DEMO_SAMPLES.iter().map(|s| s.to_string()).collect();
    inference::infer::<Backend>(backend::device(), &args.artifact_dir, samples)
        .context("demo inference failed")?;
    Ok(())
}

fn read_prompt(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
