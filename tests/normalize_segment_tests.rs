use answer_sheet_parser::text::{
    canonical, clean_answer, convert_roman_markers, normalize_collapsing, normalize_preserving_lines, roman_value,
    split_compressed,
};

#[test]
fn preserving_normalizer_unifies_breaks_and_blanks_noise() {
    let raw = "1.\u{2022}A\r\n2\u{2014}B\r3_C\n4\u{00B7}\u{2013}D";
    assert_eq!(normalize_preserving_lines(raw), "1. A\n2 B\n3 C\n4 D");
}

#[test]
fn collapsing_normalizer_joins_lines() {
    assert_eq!(normalize_collapsing("  1. A\n\n2.  B \r\n"), "1. A 2. B");
    assert_eq!(normalize_collapsing(""), "");
}

#[test]
fn roman_markers_become_digits() {
    let converted = convert_roman_markers("I.A\nii) b\nX c\n  iv: d\nXXX. e");
    assert_eq!(converted, "1.A\n2) b\n10 c\n  4: d\n30. e");
}

#[test]
fn roman_converter_leaves_words_and_out_of_range_tokens() {
    let text = "XL. d\nXylophone\nIIII. e\nXXXI) f\nvivid";
    assert_eq!(convert_roman_markers(text), text);
}

#[test]
fn bare_roman_at_line_end_still_converts() {
    // accepted false positive: a lone "X" answer reads as question 10
    assert_eq!(convert_roman_markers("5.\nX"), "5.\n10");
}

#[test]
fn roman_values_cover_one_to_thirty() {
    assert_eq!(roman_value("i"), Some(1));
    assert_eq!(roman_value("XIV"), Some(14));
    assert_eq!(roman_value("xxx"), Some(30));
    assert_eq!(roman_value("IIII"), None);
    assert_eq!(roman_value(""), None);
}

#[test]
fn compressed_line_splits_before_each_item() {
    assert_eq!(split_compressed("1.A2.B3.C"), vec!["1.A", "2.B", "3.C"]);
    assert_eq!(split_compressed("3.Z.4.C"), vec!["3.Z.", "4.C"]);
    assert_eq!(split_compressed("1. A 2. B"), vec!["1. A", "2. B"]);
}

#[test]
fn compressed_line_keeps_unfused_lines_whole() {
    assert_eq!(split_compressed("12.A"), vec!["12.A"]);
    assert_eq!(split_compressed("True 1."), vec!["True 1."]);
    assert_eq!(split_compressed("  5. Apple  "), vec!["5. Apple"]);
    assert!(split_compressed("   ").is_empty());
}

#[test]
fn answers_are_trimmed_and_capped() {
    assert_eq!(clean_answer("  Apple.!  "), "Apple");
    assert_eq!(clean_answer(&"x".repeat(55)).len(), 40);
    assert_eq!(clean_answer("..."), "");
}

#[test]
fn canonical_expands_short_synonyms() {
    assert_eq!(canonical("t"), "TRUE");
    assert_eq!(canonical("F"), "FALSE");
    assert_eq!(canonical(" y "), "YES");
    assert_eq!(canonical("n"), "NO");
    assert_eq!(canonical("apple"), "APPLE");
}
