use answer_sheet_parser::allowed::insert_preferring_allowed;
use answer_sheet_parser::{build_allowed_set, AnswerKey, ParseResult};

fn key(pairs: &[(u32, &str)]) -> AnswerKey {
    pairs.iter().map(|(q, a)| (*q, a.to_string())).collect()
}

#[test]
fn allowed_set_holds_canonical_tokens_and_synonyms() {
    let allowed = build_allowed_set(&key(&[(1, "True"), (2, "b"), (3, "Yes"), (4, "Apple")]));
    assert_eq!(allowed.len(), 6);
    assert!(allowed.contains("T"));
    assert!(allowed.contains("true"));
    assert!(allowed.contains("B"));
    assert!(allowed.contains("y"));
    assert!(allowed.contains("APPLE"));
    assert!(!allowed.contains("F"));
    assert!(!allowed.contains(""));
}

#[test]
fn short_key_answer_admits_long_form() {
    let allowed = build_allowed_set(&key(&[(1, "T"), (2, "n")]));
    assert!(allowed.contains("True"));
    assert!(allowed.contains("t"));
    assert!(allowed.contains("NO"));
    assert!(!allowed.contains("Yes"));
}

#[test]
fn empty_key_gives_empty_set() {
    assert!(build_allowed_set(&AnswerKey::new()).is_empty());
}

#[test]
fn allowed_answer_replaces_unknown_one_regardless_of_order() {
    let allowed = build_allowed_set(&key(&[(1, "A")]));

    let mut result = ParseResult::new();
    assert!(insert_preferring_allowed(&mut result, 1, "Q".to_string(), &allowed));
    assert!(insert_preferring_allowed(&mut result, 1, "A".to_string(), &allowed));
    assert_eq!(result.get(1), Some("A"));

    let mut result = ParseResult::new();
    insert_preferring_allowed(&mut result, 1, "A".to_string(), &allowed);
    assert!(!insert_preferring_allowed(&mut result, 1, "Q".to_string(), &allowed));
    assert_eq!(result.get(1), Some("A"));
}

#[test]
fn first_answer_wins_when_preference_does_not_decide() {
    let allowed = build_allowed_set(&key(&[(1, "A")]));
    let mut result = ParseResult::new();
    insert_preferring_allowed(&mut result, 1, "Q".to_string(), &allowed);
    insert_preferring_allowed(&mut result, 1, "R".to_string(), &allowed);
    assert_eq!(result.get(1), Some("Q"));

    let mut result = ParseResult::from_pairs([(1, "")]);
    insert_preferring_allowed(&mut result, 1, "R".to_string(), &allowed);
    assert_eq!(result.get(1), Some("R"));
}
