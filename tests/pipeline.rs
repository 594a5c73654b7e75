use std::fs;
use std::path::Path;

use catmod::config::{ExtractOpt, PredictOpt};
use catmod::io::store::{FeatureArray, FeatureKind, FeatureStore};
use catmod::pipeline::{extract, predict};

/// One-tree model splitting on a single feature.
fn stump(feature: usize, low: f64, high: f64) -> String {
    format!(
        r#"{{
            "features_info": {{"float_features": [{{"feature_index": {f}, "flat_feature_index": {f}, "borders": [0.5], "nan_value_treatment": "AsIs"}}]}},
            "oblivious_trees": [{{"leaf_values": [{low}, {high}], "splits": [{{"border": 0.5, "float_feature_index": {f}, "split_type": "FloatFeature"}}]}}],
            "scale_and_bias": [1, [0]]
        }}"#,
        f = feature,
        low = low,
        high = high
    )
}

fn save_site(store: &FeatureStore, key: &str, first_base: [f32; 4]) {
    let mut seq = first_base.to_vec();
    seq.extend_from_slice(&[0.25; 8]);
    store.save(key, FeatureKind::RefSeq, &FeatureArray::new(vec![3, 4], seq).unwrap()).unwrap();
    store
        .save(key, FeatureKind::ReadsAlignment, &FeatureArray::new(vec![1, 1, 6], vec![1i64, 0, 0, 0, 0, 0]).unwrap())
        .unwrap();
    store.save(key, FeatureKind::ReadsQuality, &FeatureArray::new(vec![1, 1], vec![30.0f32]).unwrap()).unwrap();
    store.save(key, FeatureKind::ReadsNormMean, &FeatureArray::new(vec![1, 5], vec![0.1f32; 5]).unwrap()).unwrap();
    store.save(key, FeatureKind::ReadsNormStdev, &FeatureArray::new(vec![1, 5], vec![0.2f32; 5]).unwrap()).unwrap();
    store.save(key, FeatureKind::ReadsCurrent, &FeatureArray::new(vec![1, 2], vec![1.0f32, 2.0]).unwrap()).unwrap();
}

fn columns(line: &str) -> Vec<String> {
    line.split('\t').map(str::to_string).collect()
}

#[test]
fn predict_scores_complete_sites_in_bed_order() {
    let dir = tempfile::tempdir().unwrap();
    let datasets = dir.path().join("datasets");
    fs::create_dir(&datasets).unwrap();
    let store = FeatureStore::new(&datasets);
    save_site(&store, "chr1_-_20-21", [0.0, 1.0, 0.0, 0.0]);
    save_site(&store, "chr1_+_10-11", [1.0, 0.0, 0.0, 0.0]);

    let bed = dir.path().join("sites.bed");
    fs::write(&bed, "chr1\t20\t21\tm1\t0\t-\nchr2\t5\t6\tm2\t0\t+\nchr1\t10\t11\tm3\t0\t+\nchr1\t20\t21\tm1\t0\t-\n").unwrap();
    let model = dir.path().join("model.json");
    fs::write(&model, stump(0, -3.0, 3.0)).unwrap();

    let opt = PredictOpt {
        bed,
        datasets: datasets.clone(),
        model,
        output: dir.path().to_path_buf(),
        threads: 2,
        quiet: true,
    };
    assert_eq!(predict::run(&opt).unwrap(), 2);

    let out = fs::read_to_string(dir.path().join("predictions.tsv")).unwrap();
    let lines: Vec<Vec<String>> = out.lines().map(columns).collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(&lines[0][..4], &["chr1", "20", "21", "0"]);
    assert_eq!(lines[0][5], "-");
    assert_eq!(&lines[1][..4], &["chr1", "10", "11", "1"]);
    let p: f64 = lines[1][4].parse().unwrap();
    assert!((p - 1.0 / (1.0 + (-3.0f64).exp())).abs() < 1e-9);

    // the ensemble vector is cached next to the inputs
    assert!(store.exists("chr1_+_10-11", FeatureKind::Ensemble));
    assert!(!store.exists("chr2_+_5-6", FeatureKind::Ensemble));
}

#[test]
fn predict_skips_vectors_shorter_than_the_model() {
    let dir = tempfile::tempdir().unwrap();
    let store = FeatureStore::new(dir.path());
    save_site(&store, "chr1_+_10-11", [1.0, 0.0, 0.0, 0.0]);
    let bed = dir.path().join("sites.bed");
    fs::write(&bed, "chr1\t10\t11\tm\t0\t+\n").unwrap();
    let model = dir.path().join("model.json");
    fs::write(&model, stump(500, 0.0, 1.0)).unwrap();
    let output = dir.path().join("calls.tsv");

    let opt = PredictOpt { bed, datasets: dir.path().to_path_buf(), model, output: output.clone(), threads: 1, quiet: true };
    assert_eq!(predict::run(&opt).unwrap(), 0);
    assert_eq!(fs::read_to_string(output).unwrap(), "");
}

#[test]
fn predict_requires_dataset_directory() {
    let dir = tempfile::tempdir().unwrap();
    let bed = dir.path().join("sites.bed");
    fs::write(&bed, "").unwrap();
    let model = dir.path().join("model.json");
    fs::write(&model, stump(0, 0.0, 1.0)).unwrap();
    let opt = PredictOpt {
        bed,
        datasets: dir.path().join("missing"),
        model,
        output: dir.path().join("out.tsv"),
        threads: 1,
        quiet: true,
    };
    assert!(predict::run(&opt).is_err());
}

fn write_inputs(dir: &Path) -> ExtractOpt {
    let reference = dir.join("ref.fa");
    fs::write(&reference, format!(">chr1\n{}\n", "ACGT".repeat(15))).unwrap();

    let align = dir.join("reads.sam");
    let seq = "ACGTACGTACGTACGTACGT";
    let qual = "I".repeat(seq.len());
    fs::write(
        &align,
        format!(
            "@HD\tVN:1.6\tSO:coordinate\n@SQ\tSN:chr1\tLN:60\n\
             fwd\t0\tchr1\t21\t60\t20M\t*\t0\t0\t{s}\t{q}\n\
             rev\t16\tchr1\t23\t60\t20M\t*\t0\t0\t{s}\t{q}\n",
            s = seq,
            q = qual
        ),
    )
    .unwrap();

    let currents = dir.join("currents");
    fs::create_dir(&currents).unwrap();
    fs::write(
        currents.join("fwd.current.tsv"),
        "chr1\t28\t33\tfwd\t0\t+\t0.1,0.2,0.3,0.4,0.5\t0.01,0.01,0.01,0.01,0.01\t1,2,3,4\n\
         chr1\t40\t45\tfwd\t0\t+\t0.1,0.2,0.3,0.4,0.5\t0.01,0.01,0.01,0.01,0.01\t1,2,3,4\n",
    )
    .unwrap();

    let bed = dir.join("sites.bed");
    fs::write(&bed, "chr1\t30\t31\tsite\t0\t+\n").unwrap();

    ExtractOpt {
        bed,
        reference,
        align,
        current: currents,
        output: dir.join("datasets"),
        threads: 1,
        seq_window: 11,
        ali_window: 5,
        cur_window: 4,
        overwrite: false,
        quiet: true,
    }
}

#[test]
fn extract_then_predict_from_sam() {
    let dir = tempfile::tempdir().unwrap();
    let opt = write_inputs(dir.path());
    extract::run(&opt).unwrap();

    let store = FeatureStore::new(&opt.output);
    let key = "chr1_+_30-31";
    let seq: FeatureArray<f32> = store.load(key, FeatureKind::RefSeq).unwrap();
    assert_eq!(seq.shape, vec![11, 4]);
    let ali: FeatureArray<i64> = store.load(key, FeatureKind::ReadsAlignment).unwrap();
    // only the forward read is on the site's strand
    assert_eq!(ali.shape, vec![1, 5, 6]);
    // chr1[28] = A
    assert_eq!(&ali.data[..6], &[1, 0, 0, 0, 0, 0]);
    let cur: FeatureArray<f32> = store.load(key, FeatureKind::ReadsCurrent).unwrap();
    assert_eq!(cur.shape, vec![1, 4]);
    assert!(store.done_marker(key).is_file());
    assert!(dir.path().join("reads.bam").is_file());
    let meta = store.load_meta().unwrap().unwrap();
    assert_eq!((meta.seq_window, meta.ali_window, meta.cur_window), (11, 5, 4));
    assert!(meta.build_timestamp.is_some());

    // 44 sequence values come first, then the mean alignment matrix
    let model = dir.path().join("model.json");
    fs::write(&model, stump(44, -2.0, 2.0)).unwrap();
    let output = dir.path().join("calls.tsv");
    let popt = PredictOpt {
        bed: opt.bed.clone(),
        datasets: opt.output.clone(),
        model,
        output: output.clone(),
        threads: 1,
        quiet: true,
    };
    assert_eq!(predict::run(&popt).unwrap(), 1);
    let out = fs::read_to_string(output).unwrap();
    let line = columns(out.trim_end());
    assert_eq!(&line[..4], &["chr1", "30", "31", "1"]);
    assert_eq!(line[5], "+");
}
