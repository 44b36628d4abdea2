//! Senta CLI - Command-line interface
//!
//! Usage:
//!   senta annotate --pipeline dictionary,lexicon --aspects pizza,staff <TEXT>...
//!   senta evaluate --pipeline llm --gold gold.xlsx --id-column id ...
//!   senta overall --tool lexicon --gold reviews.json --text-column text --label-column label

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use senta_annotator::{
    concat_results, read_annotations_json, transform_output, AspectAnnotator, DictionaryExtractor,
    GoldColumns, GoldData, GoldTable, LexiconAnnotator, LexiconClassifier, LlmExtractor,
    LlmExtrassifier, LlmOverallAnnotator, OverallAnnotator, PipelineStage,
};
use senta_core::{AppConfig, FailurePolicy, LlmClient, LoggingConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "senta")]
#[command(about = "Aspect-based sentiment pipelines and evaluation")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables take precedence)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate texts with an aspect-based pipeline
    Annotate {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Print one row per predicted aspect instead of full annotations
        #[arg(long)]
        rows: bool,

        /// Texts to annotate
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// Evaluate one or more pipelines against gold annotations
    Evaluate {
        #[command(flatten)]
        pipeline: PipelineArgs,

        #[command(flatten)]
        gold: GoldArgs,

        /// Skip documents with unusable tool output instead of aborting
        #[arg(long)]
        skip_failures: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Evaluate a document-level sentiment tool
    Overall {
        #[arg(long, value_enum, default_value_t = OverallTool::Lexicon)]
        tool: OverallTool,

        /// Gold file (.xlsx, .xls, .ods, or .json records)
        #[arg(long)]
        gold: PathBuf,

        #[arg(long)]
        sheet: Option<String>,

        #[arg(long)]
        text_column: String,

        #[arg(long)]
        label_column: String,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct PipelineArgs {
    /// Comma-separated stages: dictionary, lexicon, llm-extractor, llm.
    /// Repeat to evaluate several pipelines.
    #[arg(long, required = true)]
    pipeline: Vec<String>,

    /// Aspect terms for the dictionary extractor
    #[arg(long, value_delimiter = ',')]
    aspects: Vec<String>,
}

#[derive(Args)]
struct GoldArgs {
    /// Gold file: annotation JSON, JSON records, or a spreadsheet
    #[arg(long)]
    gold: PathBuf,

    #[arg(long)]
    sheet: Option<String>,

    #[arg(long)]
    id_column: Option<String>,

    #[arg(long)]
    text_column: Option<String>,

    #[arg(long)]
    aspect_column: Option<String>,

    #[arg(long)]
    sentiment_column: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OverallTool {
    Lexicon,
    Llm,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    init_tracing(&config.logging);

    let mut tools = Tools::new(&config);

    match cli.command {
        Commands::Annotate {
            pipeline,
            rows,
            texts,
        } => {
            let [spec] = pipeline.pipeline.as_slice() else {
                bail!("annotate takes exactly one --pipeline");
            };
            let annotator = AspectAnnotator::from_stages(tools.stages(spec, &pipeline.aspects)?)?;
            let annotations = annotator.annotate(texts.clone()).await?;

            if rows {
                let rows = transform_output(&texts, &annotations)?;
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&annotations)?);
            }
        }
        Commands::Evaluate {
            pipeline,
            gold,
            skip_failures,
            json,
        } => {
            let policy = if skip_failures {
                FailurePolicy::Skip
            } else {
                config.annotator.failure_policy
            };

            let gold_annotations = load_gold(&gold)?.into_annotations()?;
            info!(documents = gold_annotations.len(), "loaded gold annotations");

            let mut all_results = Vec::new();
            for spec in &pipeline.pipeline {
                let annotator = AspectAnnotator::from_stages(tools.stages(spec, &pipeline.aspects)?)?
                    .with_failure_policy(policy);
                let results = annotator.test_annotator(gold_annotations.clone()).await?;

                if !json {
                    println!("{}", results.report());
                }
                all_results.push(results);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&all_results)?);
            } else if all_results.len() > 1 {
                println!("{}", concat_results(&all_results)?.to_markdown());
            }
        }
        Commands::Overall {
            tool,
            gold,
            sheet,
            text_column,
            label_column,
            json,
        } => {
            let table = GoldTable::from_path(&gold, sheet.as_deref())?;
            let texts = table.column_values(&text_column)?;
            let labels = table.column_values(&label_column)?;

            let annotator = match tool {
                OverallTool::Lexicon => OverallAnnotator::new(LexiconAnnotator::default()),
                OverallTool::Llm => OverallAnnotator::new(LlmOverallAnnotator::from_config(
                    tools.llm_client()?,
                    &config.annotator,
                )),
            };
            let results = annotator.test_annotator(texts, &labels).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                println!("{}", results.report());
            }
        }
    }

    Ok(())
}

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("senta={}", config.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Builds pipeline stages by name, sharing one LLM client
struct Tools<'a> {
    config: &'a AppConfig,
    client: Option<Arc<dyn LlmClient>>,
}

impl<'a> Tools<'a> {
    fn new(config: &'a AppConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    fn llm_client(&mut self) -> anyhow::Result<Arc<dyn LlmClient>> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }
        let client: Arc<dyn LlmClient> = Arc::from(senta_llm::create_llm_client(&self.config.llm)?);
        self.client = Some(client.clone());
        Ok(client)
    }

    fn stages(&mut self, spec: &str, aspects: &[String]) -> anyhow::Result<Vec<PipelineStage>> {
        spec.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| self.stage(name, aspects))
            .collect()
    }

    fn stage(&mut self, name: &str, aspects: &[String]) -> anyhow::Result<PipelineStage> {
        let annotator = &self.config.annotator;
        let stage = match name {
            "dictionary" => {
                if aspects.is_empty() {
                    bail!("the dictionary stage needs --aspects");
                }
                PipelineStage::extractor(
                    DictionaryExtractor::new(aspects.iter().cloned())?
                        .with_context_window(annotator.context_window),
                )
            }
            "lexicon" => PipelineStage::classifier(LexiconClassifier::default()),
            "llm-extractor" => {
                let client = self.llm_client()?;
                PipelineStage::extractor(LlmExtractor::from_config(client, &self.config.annotator))
            }
            "llm" => {
                let client = self.llm_client()?;
                PipelineStage::extrassifier(LlmExtrassifier::from_config(
                    client,
                    &self.config.annotator,
                ))
            }
            other => bail!(
                "unknown stage `{other}`; expected dictionary, lexicon, llm-extractor, or llm"
            ),
        };
        Ok(stage)
    }
}

fn load_gold(args: &GoldArgs) -> anyhow::Result<GoldData> {
    let columns = GoldColumns {
        id: args.id_column.clone(),
        text: args.text_column.clone(),
        aspect: args.aspect_column.clone(),
        sentiment: args.sentiment_column.clone(),
    };

    if columns == GoldColumns::default() && is_json(&args.gold) {
        let annotations = read_annotations_json(&args.gold)
            .with_context(|| format!("reading annotations from {}", args.gold.display()))?;
        return Ok(GoldData::Annotations(annotations));
    }

    let table = GoldTable::from_path(&args.gold, args.sheet.as_deref())?;
    Ok(GoldData::table(table, columns))
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}
