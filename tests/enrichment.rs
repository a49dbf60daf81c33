//! Integration tests for ranked-list construction and GSEA.

use composable_dea::data::{DeResult, DeResultSet};
use composable_dea::enrich::{run_gsea, GeneSetCollection, GseaConfig, RankedList};
use std::io::Write;
use tempfile::NamedTempFile;

/// A result set with 30 significant genes: 15 up-regulated (log2FC 1..4)
/// and 15 down-regulated (log2FC -4..-1), plus a few non-significant rows.
fn synthetic_results() -> DeResultSet {
    let mut results = Vec::new();
    for i in 0..15 {
        let lfc = 1.0 + 3.0 * (i as f64 / 14.0);
        results.push(DeResult::new(
            format!("up_{}", i),
            "tissuetumor".to_string(),
            100.0,
            lfc,
            0.2,
            lfc / 0.2,
            1e-6,
            1e-5,
        ));
    }
    for i in 0..15 {
        let lfc = -1.0 - 3.0 * (i as f64 / 14.0);
        results.push(DeResult::new(
            format!("down_{}", i),
            "tissuetumor".to_string(),
            100.0,
            lfc,
            0.2,
            lfc / 0.2,
            1e-6,
            1e-5,
        ));
    }
    for i in 0..5 {
        results.push(DeResult::new(
            format!("ns_{}", i),
            "tissuetumor".to_string(),
            100.0,
            0.1,
            0.3,
            0.3,
            0.7,
            0.8,
        ));
    }
    DeResultSet::new("nb_wald".to_string(), results)
}

fn gmt_file(lines: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

#[test]
fn test_ranked_list_excludes_nonsignificant() {
    let ranked = RankedList::from_results(&synthetic_results(), 0.05);

    assert_eq!(ranked.len(), 30);
    assert!(!ranked.gene_ids().iter().any(|g| g.starts_with("ns_")));

    // ascending: most down-regulated first, most up-regulated last
    assert_eq!(ranked.gene_ids()[0], "down_14");
    assert_eq!(ranked.gene_ids()[29], "up_14");
    for w in ranked.scores().windows(2) {
        assert!(w[0] <= w[1]);
    }
}

#[test]
fn test_up_regulated_set_enriched_at_top() {
    let ranked = RankedList::from_results(&synthetic_results(), 0.05);

    let up_genes: Vec<String> = (0..15).map(|i| format!("up_{}", i)).collect();
    let shuffled: Vec<String> = vec![
        "up_0", "down_3", "up_7", "down_11", "up_2", "down_8", "up_12", "down_0",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    let file = gmt_file(&[
        format!("UP_PROGRAM\tna\t{}", up_genes.join("\t")),
        format!("MIXED_BAG\tna\t{}", shuffled.join("\t")),
        "UNRELATED\tna\tfoo\tbar\tbaz".to_string(),
    ]);
    let collection = GeneSetCollection::from_gmt(file.path()).unwrap();

    let enrichment = run_gsea(&ranked, &collection, &GseaConfig::default()).unwrap();

    let up = enrichment.get_set("UP_PROGRAM").unwrap();
    assert!(up.es > 0.5, "ES should be strongly positive, got {}", up.es);
    assert!(up.p_value < 0.05);
    assert!(up.q_value < 0.05);
    assert_eq!(up.n_overlap, 15);

    // the evenly mixed set stays unremarkable
    let mixed = enrichment.get_set("MIXED_BAG").unwrap();
    assert!(mixed.p_value > 0.05, "mixed set got p={}", mixed.p_value);

    // zero-overlap set is reported as degenerate without aborting the stage
    let unrelated = enrichment.get_set("UNRELATED").unwrap();
    assert!(unrelated.es.is_nan());
    assert_eq!(unrelated.p_value, 1.0);
    assert_eq!(unrelated.n_overlap, 0);

    // output ordered by ascending p-value
    for w in enrichment.results.windows(2) {
        assert!(w[0].p_value <= w[1].p_value);
    }
    assert_eq!(enrichment.results[0].set_name, "UP_PROGRAM");
}

#[test]
fn test_down_regulated_set_scores_negative() {
    let ranked = RankedList::from_results(&synthetic_results(), 0.05);

    let down_genes: Vec<String> = (0..15).map(|i| format!("down_{}", i)).collect();
    let file = gmt_file(&[format!("DOWN_PROGRAM\tna\t{}", down_genes.join("\t"))]);
    let collection = GeneSetCollection::from_gmt(file.path()).unwrap();

    let enrichment = run_gsea(&ranked, &collection, &GseaConfig::default()).unwrap();
    let down = enrichment.get_set("DOWN_PROGRAM").unwrap();

    assert!(down.es < -0.5, "ES should be strongly negative, got {}", down.es);
    assert!(down.p_value < 0.05);
}

#[test]
fn test_enrichment_tsv_output() {
    let ranked = RankedList::from_results(&synthetic_results(), 0.05);
    let up_genes: Vec<String> = (0..15).map(|i| format!("up_{}", i)).collect();
    let file = gmt_file(&[format!("UP_PROGRAM\tna\t{}", up_genes.join("\t"))]);
    let collection = GeneSetCollection::from_gmt(file.path()).unwrap();

    let enrichment = run_gsea(&ranked, &collection, &GseaConfig::quick()).unwrap();

    let out = NamedTempFile::new().unwrap();
    enrichment.to_tsv(out.path()).unwrap();
    let written = std::fs::read_to_string(out.path()).unwrap();
    assert!(written.starts_with("set_name\tes\tp_value"));
    assert!(written.contains("UP_PROGRAM"));
}
