//! DEA - Differential Expression Analysis CLI
//!
//! Command-line interface for composable differential expression analysis.

use clap::{Parser, Subcommand};
use composable_dea::data::{AnnotatedMatrix, DeResultSet, ExpressionMatrix};
use composable_dea::enrich::{run_gsea, GeneSetCollection, GseaConfig, RankedList};
use composable_dea::error::{DeaError, Result};
use composable_dea::pipeline::{Pipeline, PipelineConfig};
use composable_dea::profile::{profile_expression, profile_library_size};
use composable_dea::reduce::{run_pca, select_high_variance, PcaConfig};
use composable_dea::transform::cpm_log2;
use std::path::PathBuf;

/// Composable Differential Expression Analysis
#[derive(Parser)]
#[command(name = "dea")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline from a YAML configuration file
    Run {
        /// Path to pipeline configuration YAML
        #[arg(long)]
        config: PathBuf,

        /// Path to counts TSV
        #[arg(short = 'c', long)]
        counts: PathBuf,

        /// Path to feature annotation TSV
        #[arg(short = 'f', long)]
        features: PathBuf,

        /// Path to sample metadata TSV
        #[arg(short = 's', long)]
        samples: PathBuf,

        /// Output path for results TSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run a one-shot negative binomial differential expression analysis
    Deseq {
        /// Path to counts TSV
        #[arg(short = 'c', long)]
        counts: PathBuf,

        /// Path to feature annotation TSV
        #[arg(short = 'f', long)]
        features: PathBuf,

        /// Path to sample metadata TSV
        #[arg(short = 's', long)]
        samples: PathBuf,

        /// Grouping column in the sample metadata (e.g. "tissue")
        #[arg(short, long)]
        group: String,

        /// Reference level for the grouping column (default: alphabetical)
        #[arg(long)]
        reference: Option<String>,

        /// Level to contrast against the reference (default: first non-reference)
        #[arg(long)]
        contrast: Option<String>,

        /// Output path for results TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Detection-rate threshold for the low-expression filter
        #[arg(long, default_value = "0.2")]
        min_detection: f64,
    },

    /// Transform, select high-variance genes and compute principal components
    Pca {
        /// Path to counts TSV
        #[arg(short = 'c', long)]
        counts: PathBuf,

        /// Number of high-variance genes to keep
        #[arg(long, default_value = "500")]
        top_genes: usize,

        /// Number of components to report
        #[arg(long, default_value = "10")]
        components: usize,

        /// Scale genes to unit variance
        #[arg(long)]
        scale: bool,

        /// Output path for the scores TSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Gene set enrichment analysis on a results table
    Enrich {
        /// Path to a results TSV produced by `run` or `deseq`
        #[arg(short, long)]
        results: PathBuf,

        /// Path to a GMT gene set collection
        #[arg(short, long)]
        gene_sets: PathBuf,

        /// Significance threshold for building the ranked list
        #[arg(long, default_value = "0.05")]
        alpha: f64,

        /// Number of permutations
        #[arg(long, default_value = "1000")]
        permutations: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output path for the enrichment TSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Profile a count matrix
    Profile {
        /// Path to counts TSV
        #[arg(short = 'c', long)]
        counts: PathBuf,

        /// Output format: text, json, or yaml
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            counts,
            features,
            samples,
            output,
        } => {
            let yaml = std::fs::read_to_string(&config)?;
            let config = PipelineConfig::from_yaml(&yaml)?;
            let data = AnnotatedMatrix::from_tsv_parts(&counts, &features, &samples)?;

            let results = Pipeline::from_config(&config).run(&data)?;
            results.to_tsv(&output)?;

            println!("{}", results.summary());
            println!("Results written to {}", output.display());
        }

        Commands::Deseq {
            counts,
            features,
            samples,
            group,
            reference,
            contrast,
            output,
            min_detection,
        } => {
            let data = AnnotatedMatrix::from_tsv_parts(&counts, &features, &samples)?;

            let levels = data.samples().levels(&group)?;
            if levels.len() < 2 {
                return Err(DeaError::InvalidParameter(format!(
                    "Column '{}' needs at least two levels, found {:?}",
                    group, levels
                )));
            }
            let reference = match reference {
                Some(r) => r,
                None => levels[0].clone(),
            };
            let contrast_level = match contrast {
                Some(c) => c,
                None => levels
                    .iter()
                    .find(|l| **l != reference)
                    .cloned()
                    .ok_or_else(|| {
                        DeaError::InvalidParameter(format!(
                            "No level differs from the reference '{}'",
                            reference
                        ))
                    })?,
            };
            let coefficient = format!("{}{}", group, contrast_level);

            let results = Pipeline::new()
                .name("nb_wald")
                .filter_zero_variance()
                .filter_low_expression(min_detection)
                .model_nb_with_reference(&format!("~ {}", group), &group, &reference)
                .test_wald(&coefficient)
                .correct_bh()
                .run(&data)?;

            results.to_tsv(&output)?;
            println!("Contrast: {} vs {} (reference)", contrast_level, reference);
            println!("{}", results.summary());
            println!("Results written to {}", output.display());
        }

        Commands::Pca {
            counts,
            top_genes,
            components,
            scale,
            output,
        } => {
            let counts = ExpressionMatrix::from_tsv(&counts)?;
            let transformed = cpm_log2(&counts)?;
            let subset = select_high_variance(&transformed, top_genes);

            let config = PcaConfig {
                n_components: components,
                scale,
            };
            let result = run_pca(&subset, &config)?;
            result.to_tsv(&output)?;

            println!(
                "PCA on {} high-variance genes across {} samples",
                subset.n_genes(),
                subset.n_samples()
            );
            for (i, prop) in result.proportion_variance.iter().enumerate() {
                println!("  PC{}: {:.1}% of variance", i + 1, prop * 100.0);
            }
            println!("Scores written to {}", output.display());
        }

        Commands::Enrich {
            results,
            gene_sets,
            alpha,
            permutations,
            seed,
            output,
        } => {
            let results = DeResultSet::from_tsv(&results)?;
            let collection = GeneSetCollection::from_gmt(&gene_sets)?;
            let ranked = RankedList::from_results(&results, alpha);

            let config = GseaConfig {
                n_permutations: permutations,
                seed,
                ..Default::default()
            };
            let enrichment = run_gsea(&ranked, &collection, &config)?;
            enrichment.to_tsv(&output)?;

            print!("{}", enrichment);
            println!("Enrichment table written to {}", output.display());
        }

        Commands::Profile { counts, format } => {
            let counts = ExpressionMatrix::from_tsv(&counts)?;
            let library = profile_library_size(&counts);
            let expression = profile_expression(&counts);

            match format.as_str() {
                "json" => {
                    println!("{}", serde_json::to_string_pretty(&library)?);
                    println!("{}", serde_json::to_string_pretty(&expression)?);
                }
                "yaml" => {
                    println!("{}", serde_yaml::to_string(&library)?);
                    println!("{}", serde_yaml::to_string(&expression)?);
                }
                _ => {
                    print!("{}", library);
                    print!("{}", expression);
                }
            }
        }
    }

    Ok(())
}
