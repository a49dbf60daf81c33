//! Integration tests for the differential expression pipeline.

use composable_dea::prelude::*;
use std::collections::HashMap;
use std::io::Write;
use tempfile::NamedTempFile;

/// Deterministic multiplicative noise in [0.9, 1.1).
fn noise(seed: &mut u64) -> f64 {
    *seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
    0.9 + 0.2 * (((*seed >> 16) & 0x7FFF) as f64 / 32768.0)
}

/// Synthetic counts: 12 genes × 12 samples (6 normal, 6 tumor).
///
/// - genes 0-2: 4x up in tumor (base 100)
/// - genes 3-4: 4x down in tumor (base 200)
/// - genes 5-8: no effect (base 150)
/// - gene 9:    all zero
/// - gene 10:   constant 50 in every sample (zero variance)
/// - gene 11:   detected in only 2 of 12 samples
fn synthetic_counts() -> ExpressionMatrix {
    let n_genes = 12;
    let n_samples = 12;
    let mut seed = 7u64;
    let mut triplets = Vec::new();

    for gene in 0..n_genes {
        for sample in 0..n_samples {
            let is_tumor = sample >= 6;
            let base = match gene {
                0..=2 => {
                    if is_tumor {
                        400.0
                    } else {
                        100.0
                    }
                }
                3..=4 => {
                    if is_tumor {
                        50.0
                    } else {
                        200.0
                    }
                }
                5..=8 => 150.0,
                9 => 0.0,
                10 => {
                    triplets.push((gene, sample, 50));
                    continue;
                }
                11 => {
                    if sample < 2 {
                        90.0
                    } else {
                        0.0
                    }
                }
                _ => unreachable!(),
            };
            let count = (base * noise(&mut seed)).round() as u64;
            if count > 0 {
                triplets.push((gene, sample, count));
            }
        }
    }

    let gene_ids: Vec<String> = (0..n_genes).map(|i| format!("gene_{}", i)).collect();
    let sample_ids: Vec<String> = (0..n_samples).map(|i| format!("sample_{}", i)).collect();
    ExpressionMatrix::from_triplets((n_genes, n_samples), &triplets, gene_ids, sample_ids)
        .unwrap()
}

fn synthetic_metadata() -> SampleMetadata {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "sample_id\ttissue\tage").unwrap();
    for i in 0..12 {
        let tissue = if i < 6 { "normal" } else { "tumor" };
        writeln!(file, "sample_{}\t{}\t{}", i, tissue, 45 + i * 2).unwrap();
    }
    file.flush().unwrap();
    SampleMetadata::from_tsv(file.path()).unwrap()
}

fn synthetic_data() -> AnnotatedMatrix {
    AnnotatedMatrix::from_counts_and_samples(synthetic_counts(), synthetic_metadata()).unwrap()
}

#[test]
fn test_full_pipeline() {
    let data = synthetic_data();

    let results = Pipeline::new()
        .name("tumor-vs-normal")
        .filter_zero_variance()
        .filter_low_expression(0.25)
        .model_nb("~ tissue")
        .test_wald("tissuetumor")
        .correct_bh()
        .run(&data)
        .unwrap();

    // genes 9 (all zero), 10 (constant), 11 (rare) are gone
    assert_eq!(results.len(), 9);
    assert!(results.get_gene("gene_9").is_none());
    assert!(results.get_gene("gene_10").is_none());
    assert!(results.get_gene("gene_11").is_none());

    // the true effects are recovered with the right signs
    for gene in ["gene_0", "gene_1", "gene_2"] {
        let r = results.get_gene(gene).unwrap();
        assert!(r.significant, "{} should be significant", gene);
        assert!(
            r.log2_fold_change > 1.0,
            "{} should be up in tumor, got {}",
            gene,
            r.log2_fold_change
        );
    }
    for gene in ["gene_3", "gene_4"] {
        let r = results.get_gene(gene).unwrap();
        assert!(r.significant, "{} should be significant", gene);
        assert!(
            r.log2_fold_change < -1.0,
            "{} should be down in tumor, got {}",
            gene,
            r.log2_fold_change
        );
    }

    // base means reflect normalized expression, not zero placeholders
    for r in results.iter() {
        assert!(r.base_mean > 0.0);
    }
}

#[test]
fn test_zero_count_gene_filtered_end_to_end() {
    // 4 genes × 6 samples (3 normal, 3 tumor), one gene entirely zero.
    let triplets = vec![
        (0, 0, 100),
        (0, 1, 110),
        (0, 2, 95),
        (0, 3, 380),
        (0, 4, 420),
        (0, 5, 405),
        (1, 0, 200),
        (1, 1, 210),
        (1, 2, 190),
        (1, 3, 205),
        (1, 4, 195),
        (1, 5, 215),
        // gene 2: all zero
        (3, 0, 55),
        (3, 1, 48),
        (3, 2, 52),
        (3, 3, 49),
        (3, 4, 54),
        (3, 5, 51),
    ];
    let counts = ExpressionMatrix::from_triplets(
        (4, 6),
        &triplets,
        (0..4).map(|i| format!("g{}", i)).collect(),
        (0..6).map(|i| format!("s{}", i)).collect(),
    )
    .unwrap();

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "sample_id\ttissue").unwrap();
    for i in 0..6 {
        writeln!(file, "s{}\t{}", i, if i < 3 { "normal" } else { "tumor" }).unwrap();
    }
    file.flush().unwrap();
    let samples = SampleMetadata::from_tsv(file.path()).unwrap();
    let data = AnnotatedMatrix::from_counts_and_samples(counts, samples).unwrap();

    let (filtered, summary) = filter_zero_variance(&data).unwrap();
    assert_eq!(summary.n_removed, 1);
    assert_eq!(filtered.n_genes(), 3);
    assert_eq!(filtered.n_samples(), 6);
    assert!(!filtered.gene_ids().contains(&"g2".to_string()));
    assert_eq!(filtered.features().gene_ids(), filtered.gene_ids());

    // and the remaining genes run through the full model without error
    let results = Pipeline::new()
        .filter_zero_variance()
        .model_nb("~ tissue")
        .test_wald("tissuetumor")
        .correct_bh()
        .run(&data)
        .unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.get_gene("g0").unwrap().log2_fold_change > 1.5);
}

#[test]
fn test_reference_relabeling_flips_signs() {
    let data = synthetic_data();

    let against_normal = Pipeline::new()
        .filter_zero_variance()
        .filter_low_expression(0.25)
        .model_nb_with_reference("~ tissue", "tissue", "normal")
        .test_wald("tissuetumor")
        .correct_bh()
        .run(&data)
        .unwrap();

    let against_tumor = Pipeline::new()
        .filter_zero_variance()
        .filter_low_expression(0.25)
        .model_nb_with_reference("~ tissue", "tissue", "tumor")
        .test_wald("tissuenormal")
        .correct_bh()
        .run(&data)
        .unwrap();

    assert_eq!(against_normal.len(), against_tumor.len());

    for a in against_normal.iter() {
        let b = against_tumor.get_gene(&a.gene_id).unwrap();
        // sign flips, magnitude stays
        assert!(
            (a.log2_fold_change + b.log2_fold_change).abs() < 1e-3,
            "{}: {} vs {}",
            a.gene_id,
            a.log2_fold_change,
            b.log2_fold_change
        );
        // significance calls agree
        assert_eq!(a.significant, b.significant, "{}", a.gene_id);
    }

    // the p-value ranking is preserved
    let order_a: Vec<&str> = against_normal
        .sorted_by_pvalue()
        .iter()
        .map(|r| r.gene_id.as_str())
        .collect();
    let order_b: Vec<&str> = against_tumor
        .sorted_by_pvalue()
        .iter()
        .map(|r| r.gene_id.as_str())
        .collect();
    assert_eq!(order_a, order_b);
}

#[test]
fn test_covariate_formula_runs() {
    let data = synthetic_data();

    let results = Pipeline::new()
        .filter_zero_variance()
        .filter_low_expression(0.25)
        .model_nb("~ tissue + age")
        .test_wald("tissuetumor")
        .correct_bh()
        .run(&data)
        .unwrap();

    assert_eq!(results.len(), 9);
}

#[test]
fn test_recode_then_model() {
    let data = synthetic_data();

    let mut mapping = HashMap::new();
    mapping.insert("normal".to_string(), "control".to_string());
    mapping.insert("tumor".to_string(), "case".to_string());

    // "case" sorts before "control", so the reference must be pinned
    let results = Pipeline::new()
        .recode_variable("tissue", mapping)
        .filter_zero_variance()
        .filter_low_expression(0.25)
        .model_nb_with_reference("~ tissue", "tissue", "control")
        .test_wald("tissuecase")
        .correct_bh()
        .run(&data)
        .unwrap();

    let r = results.get_gene("gene_0").unwrap();
    assert_eq!(r.contrast, "tissuecase");
    assert!(r.log2_fold_change > 1.0);
}

#[test]
fn test_empty_predicate_match_fails_loudly_at_model() {
    let data = synthetic_data();

    // the predicate matches nothing, leaving a valid empty artifact; the
    // model stage is the one that refuses it
    let err = Pipeline::new()
        .filter_samples("tissue", &["adjacent"], PredicateAction::Keep)
        .model_nb("~ tissue")
        .test_wald("tissuetumor")
        .correct_bh()
        .run(&data)
        .unwrap_err();

    let message = err.to_string();
    assert!(
        message.contains("ModelNb") || message.contains("Empty") || message.contains("samples"),
        "unexpected error: {}",
        message
    );
}

#[test]
fn test_alignment_invariant_through_chained_filters() {
    let data = synthetic_data();

    let step1 = filter_samples(
        &data,
        &SamplePredicate::keep("tissue", &["normal", "tumor"]),
    )
    .unwrap();
    let (step2, _) = filter_zero_variance(&step1).unwrap();
    let (step3, _) = filter_low_expression(&step2, 0.25).unwrap();
    let (step4, _) = filter_min_count(&step3, 10).unwrap();

    for stage in [&step1, &step2, &step3, &step4] {
        assert_eq!(stage.counts().gene_ids(), stage.features().gene_ids());
        assert_eq!(stage.counts().sample_ids(), stage.samples().sample_ids());
    }
}
