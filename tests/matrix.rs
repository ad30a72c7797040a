use ae_ingest::matrix::{ProcessedDataTable, parse_matrix};

fn table_from(files: &[&str]) -> ProcessedDataTable {
    let mut table = ProcessedDataTable::new();
    for text in files {
        parse_matrix(text.as_bytes(), &mut table).unwrap();
    }
    table
}

#[test]
fn two_channel_scenario() {
    let table = table_from(&[
        "\tS1\tS1\tS2\n\tratio:ch1\tratio:ch2\tratio:ch1\nprobeA:1\t1.0\t2.0\t3.0\n",
    ]);

    assert_eq!(table.samples(), ["S1", "S2"]);
    let row = table.get("1").expect("prefix-stripped probe key");
    assert_eq!(row["ch1"], ["1.0", "3.0"]);
    assert_eq!(row["ch2"], ["2.0"]);
}

#[test]
fn sample_names_are_deduplicated_in_order() {
    let table = table_from(&["\tB\tA\tB\tC\tA\n\tv\tv\tv\tv\tv\np\t1\t2\t3\t4\t5\n"]);
    assert_eq!(table.samples(), ["B", "A", "C"]);
}

#[test]
fn results_accumulate_across_files() {
    let table = table_from(&[
        "\tS1\n\tsignal\np1\t1.0\n",
        "\tS2\n\tsignal\np2\t2.0\n",
    ]);
    assert_eq!(table.samples(), ["S1", "S2"]);
    assert_eq!(table.probe_count(), 2);
}

#[test]
fn duplicate_probe_across_files_does_not_error() {
    let table = table_from(&[
        "\tS1\n\tsignal\np1\t1.0\n",
        "\tS1\n\tsignal\np1\t7.5\n",
    ]);
    // Documented rule: the later file wins for that probe.
    assert_eq!(table.get("p1").unwrap()["signal"], ["7.5"]);
}

#[test]
fn type_tokens_without_qualifier_are_taken_whole() {
    let table = table_from(&["\tS1\n\tVALUE\np1\t42\n"]);
    assert!(table.get("p1").unwrap().contains_key("VALUE"));
}
