use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use headline_topics::{
    DocumentRecord, Pipeline, PipelineConfig, PreparedCorpus, ResultTable, TrainedPipeline,
};
use tracing::info;

/// Headline topics: unsupervised topic tagging for news headlines.
///
/// Records are JSON lines with at least `publish_date` and `headline_text`.
#[derive(Parser)]
#[command(name = "headline-topics", version, about)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenize, build the vocabulary and encode a training corpus
    Prepare {
        /// Training records (JSON lines)
        #[arg(long)]
        input: PathBuf,
        /// Where to write the prepared corpus (CBOR)
        #[arg(long)]
        output: PathBuf,
    },

    /// Train a topic model on a prepared corpus
    Train {
        /// Prepared corpus written by `prepare`
        #[arg(long)]
        prepared: PathBuf,
        /// Where to write the trained model (CBOR)
        #[arg(long)]
        output: PathBuf,
    },

    /// Tag records with their best topic using a trained model
    Assign {
        /// Trained model written by `train` or `run`
        #[arg(long)]
        model: PathBuf,
        /// Records to tag (JSON lines)
        #[arg(long)]
        input: PathBuf,
        /// Result rows (JSON lines); stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Prepare, train and assign in one go
    Run {
        /// Training records (JSON lines)
        #[arg(long)]
        train: PathBuf,
        /// Records to tag; the training records when omitted
        #[arg(long)]
        query: Option<PathBuf>,
        /// Result rows (JSON lines); stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also save the trained model here
        #[arg(long)]
        save_model: Option<PathBuf>,
    },
}

/// Command-line overrides; unset flags fall back to `TOPICS_*` variables,
/// then to defaults.
#[derive(Args)]
struct Overrides {
    #[arg(long, global = true)]
    min_doc_count: Option<u64>,
    #[arg(long, global = true)]
    max_doc_fraction: Option<f64>,
    /// Vocabulary cap; 0 disables it
    #[arg(long, global = true)]
    keep_n: Option<usize>,
    #[arg(long, global = true)]
    num_topics: Option<usize>,
    #[arg(long, global = true)]
    passes: Option<usize>,
    #[arg(long, global = true)]
    workers: Option<usize>,
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// Terms shown per topic in result rows
    #[arg(long, global = true)]
    top_terms: Option<usize>,
}

impl Overrides {
    fn apply(self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(v) = self.min_doc_count {
            config.min_doc_count = v;
        }
        if let Some(v) = self.max_doc_fraction {
            config.max_doc_fraction = v;
        }
        if let Some(v) = self.keep_n {
            config.keep_n = (v > 0).then_some(v);
        }
        if let Some(v) = self.num_topics {
            config.num_topics = v;
        }
        if let Some(v) = self.passes {
            config.passes = v;
        }
        if let Some(v) = self.workers {
            config.workers = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.top_terms {
            config.top_terms = v;
        }
        config
    }
}

fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("headline_topics=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.overrides.apply(PipelineConfig::from_env()?);
    let pipeline = Pipeline::new(config)?;

    match cli.command {
        Commands::Prepare { input, output } => {
            let records = read_records(&input)?;
            let prepared = timed("prepare", || pipeline.prepare(&records))?;
            prepared
                .to_writer(BufWriter::new(create(&output)?))
                .with_context(|| format!("writing {}", output.display()))?;
            info!(path = %output.display(), "prepared corpus saved");
        }

        Commands::Train { prepared, output } => {
            let corpus = PreparedCorpus::from_reader(BufReader::new(open(&prepared)?))
                .with_context(|| format!("reading {}", prepared.display()))?;
            let model = timed("train", || pipeline.train(&corpus))?;
            save_model(&TrainedPipeline::new(corpus, model), &output)?;
        }

        Commands::Assign { model, input, output } => {
            let trained = TrainedPipeline::from_reader(BufReader::new(open(&model)?))
                .with_context(|| format!("reading {}", model.display()))?;
            let records = read_records(&input)?;
            let table = timed("assign", || pipeline.assign(&trained, &records))?;
            write_results(&table, output.as_deref())?;
        }

        Commands::Run {
            train,
            query,
            output,
            save_model: model_path,
        } => {
            let started = Instant::now();
            let records = read_records(&train)?;
            let prepared = timed("prepare", || pipeline.prepare(&records))?;
            let model = timed("train", || pipeline.train(&prepared))?;
            let trained = TrainedPipeline::new(prepared, model);
            for t in 0..trained.model.num_topics() {
                if let Some(rendered) = trained.model.print_topic(t, pipeline.config().top_terms) {
                    info!(topic = t, terms = %rendered, "topic");
                }
            }
            if let Some(path) = model_path {
                save_model(&trained, &path)?;
            }
            let queries = match query {
                Some(path) => read_records(&path)?,
                None => records,
            };
            let table = timed("assign", || pipeline.assign(&trained, &queries))?;
            write_results(&table, output.as_deref())?;
            info!(elapsed_ms = started.elapsed().as_millis() as u64, "run finished");
        }
    }

    Ok(())
}

fn timed<T>(stage: &'static str, f: impl FnOnce() -> headline_topics::Result<T>) -> Result<T> {
    let started = Instant::now();
    let out = f().with_context(|| format!("{stage} stage failed"))?;
    info!(stage, elapsed_ms = started.elapsed().as_millis() as u64, "stage finished");
    Ok(out)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("opening {}", path.display()))
}

fn create(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("creating {}", path.display()))
}

/// One JSON object per line; blank lines are skipped.
fn read_records(path: &Path) -> Result<Vec<DocumentRecord>> {
    let reader = BufReader::new(open(path)?);
    let mut records = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: DocumentRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: malformed record", path.display(), n + 1))?;
        records.push(record);
    }
    info!(path = %path.display(), records = records.len(), "records loaded");
    Ok(records)
}

fn save_model(trained: &TrainedPipeline, path: &Path) -> Result<()> {
    trained
        .to_writer(BufWriter::new(create(path)?))
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), topics = trained.model.num_topics(), "model saved");
    Ok(())
}

fn write_results(table: &ResultTable, path: Option<&Path>) -> Result<()> {
    let sink: Box<dyn Write> = match path {
        Some(p) => Box::new(create(p)?),
        None => Box::new(io::stdout().lock()),
    };
    let mut out = BufWriter::new(sink);
    for row in &table.rows {
        serde_json::to_writer(&mut out, row)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
