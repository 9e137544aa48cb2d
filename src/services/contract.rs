// src/services/contract.rs

use std::{
    collections::{BTreeSet, HashSet},
    sync::LazyLock,
};

use regex::Regex;
use url::Url;
use validator::Validate;

use crate::{
    error::{AppError, FieldError, field_errors},
    models::{
        question::{
            AnswerKey, GapFields, KeywordFields, OptionDef, OptionFields, PairFields, QuestionDef,
        },
        quiz::{QuizRequest, ScoringConfig},
    },
    utils::html::clean_html,
};

static GAP_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_-]+)\s*\}\}").expect("gap marker pattern is valid")
});

/// Gap identifiers referenced by `{{id}}` markers in a question text.
pub fn gap_markers(text: &str) -> BTreeSet<String> {
    GAP_MARKER
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// The option pair a true/false question gets when none are supplied.
pub fn default_true_false() -> Vec<OptionDef> {
    vec![
        OptionDef {
            id: None,
            fields: OptionFields::new("True", true),
        },
        OptionDef {
            id: None,
            fields: OptionFields::new("False", false),
        },
    ]
}

/// Sanitizes rich text and fills in implied answer keys.
pub fn normalize(req: &mut QuizRequest) {
    for def in &mut req.questions {
        def.fields.text = clean_html(&def.fields.text);
        def.fields.explanation = def.fields.explanation.as_deref().map(clean_html);
        if let AnswerKey::TrueFalse { options } = &mut def.answer_key {
            if options.is_empty() {
                *options = default_true_false();
            }
        }
    }
}

/// Normalizes then validates a full quiz definition.
pub fn prepare(req: &mut QuizRequest) -> Result<(), AppError> {
    normalize(req);
    check_quiz(req)
}

pub fn check_quiz(req: &QuizRequest) -> Result<(), AppError> {
    let mut errors = Vec::new();

    if let Err(e) = req.fields.validate() {
        errors.extend(field_errors("", &e));
    }
    check_scoring(&req.fields.scoring_config, &mut errors);
    check_unique_ids(
        "questions",
        req.questions.iter().map(|q| q.id),
        &mut errors,
    );
    for (index, def) in req.questions.iter().enumerate() {
        check_question(&format!("questions[{}]", index), def, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

fn check_scoring(config: &ScoringConfig, errors: &mut Vec<FieldError>) {
    if let Err(e) = config.validate() {
        errors.extend(field_errors("scoring_config", &e));
    }
    for (name, value) in [
        ("time_limit_minutes", config.time_limit_minutes),
        ("max_attempts", config.max_attempts),
    ] {
        if matches!(value, Some(v) if v < 1) {
            errors.push(FieldError::new(
                format!("scoring_config.{}", name),
                "range",
                format!("{} must be at least 1", name),
            ));
        }
    }
}

fn check_unique_ids(
    path: &str,
    ids: impl Iterator<Item = Option<i64>>,
    errors: &mut Vec<FieldError>,
) {
    let mut seen = HashSet::new();
    for (index, id) in ids.enumerate() {
        if let Some(id) = id {
            if !seen.insert(id) {
                errors.push(FieldError::new(
                    format!("{}[{}].id", path, index),
                    "duplicate_id",
                    format!("id {} appears more than once", id),
                ));
            }
        }
    }
}

fn check_url(path: String, value: Option<&str>, errors: &mut Vec<FieldError>) {
    if let Some(raw) = value {
        if Url::parse(raw).is_err() {
            errors.push(FieldError::new(path, "url", "must be an absolute URL"));
        }
    }
}

fn check_rows<R: Validate>(path: &str, rows: &[&R], errors: &mut Vec<FieldError>) {
    for (index, row) in rows.iter().enumerate() {
        if let Err(e) = row.validate() {
            errors.extend(field_errors(&format!("{}[{}]", path, index), &e));
        }
    }
}

fn check_question(path: &str, def: &QuestionDef, errors: &mut Vec<FieldError>) {
    if let Err(e) = def.fields.validate() {
        errors.extend(field_errors(path, &e));
    }
    check_url(
        format!("{}.image_url", path),
        def.fields.image_url.as_deref(),
        errors,
    );

    match &def.answer_key {
        AnswerKey::SingleChoice { options } => {
            check_options(path, options, errors);
            check_min(path, "options", options.len(), 2, errors);
            let correct = correct_count(options);
            if correct != 1 {
                errors.push(FieldError::new(
                    format!("{}.options", path),
                    "correct_count",
                    format!("exactly one option must be correct, found {}", correct),
                ));
            }
        }
        AnswerKey::MultipleChoice { options } => {
            check_options(path, options, errors);
            check_min(path, "options", options.len(), 2, errors);
            if correct_count(options) == 0 {
                errors.push(FieldError::new(
                    format!("{}.options", path),
                    "correct_count",
                    "at least one option must be correct",
                ));
            }
        }
        AnswerKey::TrueFalse { options } => {
            check_options(path, options, errors);
            let texts: BTreeSet<&str> = options.iter().map(|o| o.fields.text.as_str()).collect();
            if options.len() != 2 || texts != BTreeSet::from(["False", "True"]) {
                errors.push(FieldError::new(
                    format!("{}.options", path),
                    "true_false_options",
                    "exactly two options, \"True\" and \"False\", are required",
                ));
            }
            if correct_count(options) != 1 {
                errors.push(FieldError::new(
                    format!("{}.options", path),
                    "correct_count",
                    "exactly one of True/False must be correct",
                ));
            }
        }
        AnswerKey::Matching { matching_pairs } => {
            check_pairs(path, matching_pairs, false, errors);
        }
        AnswerKey::ImageMatching { matching_pairs } => {
            check_pairs(path, matching_pairs, true, errors);
        }
        AnswerKey::Keywords { keywords } => check_keywords(path, keywords, errors),
        AnswerKey::FillGap { gaps } => check_gaps(path, &def.fields.text, gaps, errors),
    }
}

fn check_min(path: &str, field: &str, len: usize, min: usize, errors: &mut Vec<FieldError>) {
    if len < min {
        errors.push(FieldError::new(
            format!("{}.{}", path, field),
            "min_count",
            format!("at least {} {} required, found {}", min, field, len),
        ));
    }
}

fn correct_count(options: &[OptionDef]) -> usize {
    options.iter().filter(|o| o.fields.is_correct).count()
}

fn check_options(path: &str, options: &[OptionDef], errors: &mut Vec<FieldError>) {
    let list = format!("{}.options", path);
    let fields: Vec<&OptionFields> = options.iter().map(|o| &o.fields).collect();
    check_rows(&list, &fields, errors);
    check_unique_ids(&list, options.iter().map(|o| o.id), errors);
    for (index, option) in options.iter().enumerate() {
        check_url(
            format!("{}[{}].image_url", list, index),
            option.fields.image_url.as_deref(),
            errors,
        );
    }
}

fn check_pairs(path: &str, pairs: &[PairFields], with_images: bool, errors: &mut Vec<FieldError>) {
    let list = format!("{}.matching_pairs", path);
    check_rows(&list, &pairs.iter().collect::<Vec<_>>(), errors);
    check_min(path, "matching_pairs", pairs.len(), 2, errors);

    let mut keys = HashSet::new();
    for (index, pair) in pairs.iter().enumerate() {
        let at = format!("{}[{}]", list, index);
        if !keys.insert(pair.pair_key.as_str()) {
            errors.push(FieldError::new(
                format!("{}.pair_key", at),
                "duplicate_pair_key",
                format!("pair_key '{}' is used more than once", pair.pair_key),
            ));
        }
        if with_images {
            match pair.prompt_image_url.as_deref() {
                Some(raw) if !raw.trim().is_empty() => {
                    check_url(format!("{}.prompt_image_url", at), Some(raw), errors)
                }
                _ => errors.push(FieldError::new(
                    format!("{}.prompt_image_url", at),
                    "required",
                    "image matching pairs need a prompt image",
                )),
            }
        } else if pair.prompt_text.as_deref().is_none_or(|t| t.trim().is_empty()) {
            errors.push(FieldError::new(
                format!("{}.prompt_text", at),
                "required",
                "matching pairs need a prompt text",
            ));
        }
    }
}

/// Two keywords collide when equal, or equal ignoring case while either
/// one is case-insensitive.
fn keywords_collide(a: &KeywordFields, b: &KeywordFields) -> bool {
    if a.keyword == b.keyword {
        return true;
    }
    (!a.case_sensitive || !b.case_sensitive) && a.keyword.to_lowercase() == b.keyword.to_lowercase()
}

fn check_keywords(path: &str, keywords: &[KeywordFields], errors: &mut Vec<FieldError>) {
    let list = format!("{}.keywords", path);
    check_rows(&list, &keywords.iter().collect::<Vec<_>>(), errors);
    check_min(path, "keywords", keywords.len(), 1, errors);

    for (index, keyword) in keywords.iter().enumerate() {
        if keywords[..index].iter().any(|k| keywords_collide(k, keyword)) {
            errors.push(FieldError::new(
                format!("{}[{}].keyword", list, index),
                "duplicate_keyword",
                format!("keyword '{}' duplicates an earlier one", keyword.keyword),
            ));
        }
    }
}

/// Checks an edited fill-gap text against the answers already stored.
pub fn check_gap_text(text: &str, gaps: &[GapFields]) -> Result<(), AppError> {
    let mut errors = Vec::new();
    check_gaps("", text, gaps, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

fn at(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", path, field)
    }
}

fn check_gaps(path: &str, text: &str, gaps: &[GapFields], errors: &mut Vec<FieldError>) {
    let list = at(path, "gaps");
    check_rows(&list, &gaps.iter().collect::<Vec<_>>(), errors);

    let markers = gap_markers(text);
    if markers.is_empty() {
        errors.push(FieldError::new(
            at(path, "text"),
            "no_gap_markers",
            "text must contain at least one {{gap}} marker",
        ));
    }

    let answered: BTreeSet<&str> = gaps.iter().map(|g| g.gap_identifier.as_str()).collect();
    for marker in &markers {
        if !answered.contains(marker.as_str()) {
            errors.push(FieldError::new(
                list.clone(),
                "unanswered_gap",
                format!("gap '{}' has no answer", marker),
            ));
        }
    }
    for (index, gap) in gaps.iter().enumerate() {
        if !markers.contains(&gap.gap_identifier) {
            errors.push(FieldError::new(
                format!("{}[{}].gap_identifier", list, index),
                "orphan_gap",
                format!("'{}' does not match any marker in the text", gap.gap_identifier),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn request(questions: Value) -> QuizRequest {
        serde_json::from_value(json!({
            "section_id": 1,
            "title": "Quiz",
            "questions": questions,
        }))
        .unwrap()
    }

    fn codes(result: Result<(), AppError>) -> Vec<(String, String)> {
        match result {
            Err(AppError::Validation(fields)) => {
                fields.into_iter().map(|f| (f.field, f.code)).collect()
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn well_formed_quiz_passes() {
        let mut req = request(json!([
            {"type": "single_choice", "text": "Pick", "options": [
                {"text": "A", "is_correct": true}, {"text": "B"}
            ]},
            {"type": "multiple_choice", "text": "Pick many", "options": [
                {"text": "A", "is_correct": true}, {"text": "B", "is_correct": true}
            ]},
            {"type": "true_false", "text": "Sky is blue"},
            {"type": "matching", "text": "Match", "matching_pairs": [
                {"pair_key": "a", "prompt_text": "1", "answer_text": "one"},
                {"pair_key": "b", "prompt_text": "2", "answer_text": "two"}
            ]},
            {"type": "image_matching", "text": "Match images", "matching_pairs": [
                {"pair_key": "a", "prompt_image_url": "https://cdn.example.com/a.png", "answer_text": "A"},
                {"pair_key": "b", "prompt_image_url": "https://cdn.example.com/b.png", "answer_text": "B"}
            ]},
            {"type": "keywords", "text": "Capital?", "keywords": [{"keyword": "Paris"}]},
            {"type": "fill_gap", "text": "The {{ animal }} says {{sound}}", "gaps": [
                {"gap_identifier": "animal", "correct_text": "cow"},
                {"gap_identifier": "sound", "correct_text": "moo"}
            ]}
        ]));
        assert!(prepare(&mut req).is_ok());
    }

    #[test]
    fn true_false_without_options_gets_default_pair() {
        let mut req = request(json!([{"type": "true_false", "text": "Water is wet"}]));
        normalize(&mut req);
        match &req.questions[0].answer_key {
            AnswerKey::TrueFalse { options } => {
                assert_eq!(options[0].fields, OptionFields::new("True", true));
                assert_eq!(options[1].fields, OptionFields::new("False", false));
            }
            other => panic!("unexpected answer key {:?}", other),
        }
    }

    #[test]
    fn single_choice_needs_exactly_one_correct() {
        let req = request(json!([
            {"type": "single_choice", "text": "Q", "options": [
                {"text": "A", "is_correct": true}, {"text": "B", "is_correct": true}
            ]}
        ]));
        assert_eq!(
            codes(check_quiz(&req)),
            vec![("questions[0].options".to_string(), "correct_count".to_string())]
        );
    }

    #[test]
    fn choice_questions_need_two_options() {
        let req = request(json!([
            {"type": "multiple_choice", "text": "Q", "options": [{"text": "A", "is_correct": true}]}
        ]));
        assert_eq!(
            codes(check_quiz(&req)),
            vec![("questions[0].options".to_string(), "min_count".to_string())]
        );
    }

    #[test]
    fn true_false_texts_are_fixed() {
        let req = request(json!([
            {"type": "true_false", "text": "Q", "options": [
                {"text": "Yes", "is_correct": true}, {"text": "No"}
            ]}
        ]));
        assert_eq!(
            codes(check_quiz(&req)),
            vec![("questions[0].options".to_string(), "true_false_options".to_string())]
        );
    }

    #[test]
    fn matching_pairs_need_unique_keys_and_prompts() {
        let req = request(json!([
            {"type": "matching", "text": "Q", "matching_pairs": [
                {"pair_key": "a", "prompt_text": "1", "answer_text": "one"},
                {"pair_key": "a", "answer_text": "two"}
            ]}
        ]));
        let found = codes(check_quiz(&req));
        assert!(found.contains(&(
            "questions[0].matching_pairs[1].pair_key".to_string(),
            "duplicate_pair_key".to_string()
        )));
        assert!(found.contains(&(
            "questions[0].matching_pairs[1].prompt_text".to_string(),
            "required".to_string()
        )));
    }

    #[test]
    fn image_matching_requires_absolute_urls() {
        let req = request(json!([
            {"type": "image_matching", "text": "Q", "matching_pairs": [
                {"pair_key": "a", "prompt_image_url": "/relative.png", "answer_text": "A"},
                {"pair_key": "b", "prompt_image_url": "https://cdn.example.com/b.png", "answer_text": "B"}
            ]}
        ]));
        assert_eq!(
            codes(check_quiz(&req)),
            vec![(
                "questions[0].matching_pairs[0].prompt_image_url".to_string(),
                "url".to_string()
            )]
        );
    }

    #[test]
    fn keyword_duplicates_follow_the_case_rule() {
        let a = KeywordFields {
            keyword: "Paris".into(),
            case_sensitive: true,
            points_per_keyword: 1.0,
        };
        let b = KeywordFields {
            keyword: "paris".into(),
            case_sensitive: true,
            points_per_keyword: 1.0,
        };
        assert!(!keywords_collide(&a, &b));

        let c = KeywordFields {
            case_sensitive: false,
            ..b.clone()
        };
        assert!(keywords_collide(&a, &c));
    }

    #[test]
    fn gaps_must_match_markers_both_ways() {
        let req = request(json!([
            {"type": "fill_gap", "text": "The {{animal}} says {{sound}}", "gaps": [
                {"gap_identifier": "animal", "correct_text": "cow"},
                {"gap_identifier": "colour", "correct_text": "brown"}
            ]}
        ]));
        let found = codes(check_quiz(&req));
        assert!(found.contains(&("questions[0].gaps".to_string(), "unanswered_gap".to_string())));
        assert!(found.contains(&(
            "questions[0].gaps[1].gap_identifier".to_string(),
            "orphan_gap".to_string()
        )));
    }

    #[test]
    fn fill_gap_without_markers_is_rejected() {
        let req = request(json!([{"type": "fill_gap", "text": "No markers here", "gaps": []}]));
        assert_eq!(
            codes(check_quiz(&req)),
            vec![("questions[0].text".to_string(), "no_gap_markers".to_string())]
        );
    }

    #[test]
    fn duplicate_question_ids_are_rejected() {
        let req = request(json!([
            {"id": 5, "type": "keywords", "text": "A", "keywords": [{"keyword": "x"}]},
            {"id": 5, "type": "keywords", "text": "B", "keywords": [{"keyword": "y"}]}
        ]));
        assert_eq!(
            codes(check_quiz(&req)),
            vec![("questions[1].id".to_string(), "duplicate_id".to_string())]
        );
    }

    #[test]
    fn scoring_limits_must_be_positive() {
        let mut req = request(json!([]));
        req.fields.scoring_config.max_attempts = Some(0);
        assert_eq!(
            codes(check_quiz(&req)),
            vec![("scoring_config.max_attempts".to_string(), "range".to_string())]
        );
    }

    #[test]
    fn edited_gap_text_is_checked_against_stored_answers() {
        let stored = vec![GapFields {
            gap_identifier: "animal".into(),
            correct_text: "cow".into(),
            case_sensitive: false,
            points: 1.0,
        }];

        assert!(check_gap_text("A {{animal}} goes moo", &stored).is_ok());
        assert_eq!(
            codes(check_gap_text("The {{colour}} sky", &stored)),
            vec![
                ("gaps".to_string(), "unanswered_gap".to_string()),
                ("gaps[0].gap_identifier".to_string(), "orphan_gap".to_string()),
            ]
        );
        assert_eq!(
            codes(check_gap_text("No markers", &stored))[0],
            ("text".to_string(), "no_gap_markers".to_string())
        );
    }

    #[test]
    fn markers_tolerate_inner_whitespace() {
        let found = gap_markers("{{a}} and {{ b-2 }} but not {single}");
        assert_eq!(found, BTreeSet::from(["a".to_string(), "b-2".to_string()]));
    }
}
