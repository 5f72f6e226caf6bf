//! Tests for static `@media` and `@supports` evaluation.

use foldline_css::media::{Evaluation, MediaContext, evaluate_supports};
use foldline_dom::Viewport;

fn desktop() -> MediaContext {
    MediaContext::screen(Viewport::new(1300.0, 900.0))
}

fn phone() -> MediaContext {
    MediaContext::screen(Viewport::new(375.0, 812.0))
}

fn eval(context: &MediaContext, query: &str) -> Evaluation {
    let evaluation = context.evaluate_list(query);
    assert!(!evaluation.malformed, "{query} should parse");
    evaluation.result
}

#[test]
fn test_empty_list_is_true() {
    assert_eq!(eval(&desktop(), ""), Evaluation::True);
    assert_eq!(eval(&desktop(), "   "), Evaluation::True);
}

#[test]
fn test_media_types() {
    let context = desktop();
    assert_eq!(eval(&context, "screen"), Evaluation::True);
    assert_eq!(eval(&context, "all"), Evaluation::True);
    assert_eq!(eval(&context, "print"), Evaluation::False);
    assert_eq!(eval(&context, "PRINT"), Evaluation::False);
    assert_eq!(eval(&context, "tv"), Evaluation::False);
    assert_eq!(eval(&context, "not print"), Evaluation::True);
    assert_eq!(eval(&context, "only screen"), Evaluation::True);
}

#[test]
fn test_min_max_width() {
    assert_eq!(eval(&desktop(), "(min-width:768px)"), Evaluation::True);
    assert_eq!(eval(&phone(), "(min-width:768px)"), Evaluation::False);
    assert_eq!(eval(&phone(), "(max-width: 600px)"), Evaluation::True);
    assert_eq!(eval(&desktop(), "(width: 1300px)"), Evaluation::True);
    assert_eq!(eval(&desktop(), "(min-height: 1000px)"), Evaluation::False);
}

#[test]
fn test_type_with_conditions() {
    let context = desktop();
    assert_eq!(
        eval(&context, "only screen and (min-width: 768px) and (max-width: 1400px)"),
        Evaluation::True
    );
    assert_eq!(eval(&context, "print and (min-width: 768px)"), Evaluation::False);
    assert_eq!(eval(&context, "not screen and (max-width: 500px)"), Evaluation::True);
}

#[test]
fn test_query_list_is_a_disjunction() {
    assert_eq!(eval(&phone(), "print, (max-width: 400px)"), Evaluation::True);
    assert_eq!(eval(&desktop(), "print, (max-width: 400px)"), Evaluation::False);
}

#[test]
fn test_units() {
    let context = desktop();
    assert_eq!(eval(&context, "(min-width: 48em)"), Evaluation::True);
    assert_eq!(eval(&context, "(min-width: 82rem)"), Evaluation::False);
    assert_eq!(eval(&context, "(max-width: 14in)"), Evaluation::True);
    assert_eq!(eval(&context, "(min-width: 0)"), Evaluation::True);
    assert_eq!(eval(&context, "(min-width: 50vw)"), Evaluation::True);
}

#[test]
fn test_orientation_and_aspect_ratio() {
    assert_eq!(eval(&desktop(), "(orientation: landscape)"), Evaluation::True);
    assert_eq!(eval(&phone(), "(orientation: portrait)"), Evaluation::True);
    assert_eq!(eval(&desktop(), "(min-aspect-ratio: 4/3)"), Evaluation::True);
    assert_eq!(eval(&phone(), "(min-aspect-ratio: 4/3)"), Evaluation::False);
    assert_eq!(eval(&phone(), "(max-aspect-ratio: 1)"), Evaluation::True);
}

#[test]
fn test_range_syntax() {
    let context = desktop();
    assert_eq!(eval(&context, "(width >= 600px)"), Evaluation::True);
    assert_eq!(eval(&context, "(width < 600px)"), Evaluation::False);
    assert_eq!(eval(&context, "(600px <= width)"), Evaluation::True);
    assert_eq!(eval(&context, "(400px <= width <= 1400px)"), Evaluation::True);
    assert_eq!(eval(&context, "(400px < width < 1000px)"), Evaluation::False);
    assert_eq!(eval(&context, "(1400px > width > 400px)"), Evaluation::True);
}

#[test]
fn test_condition_combinators() {
    let context = desktop();
    assert_eq!(eval(&context, "not (max-width: 500px)"), Evaluation::True);
    assert_eq!(
        eval(&context, "(max-width: 500px) or (min-width: 1200px)"),
        Evaluation::True
    );
    assert_eq!(
        eval(&context, "((min-width: 500px) and (max-width: 800px)) or (orientation: portrait)"),
        Evaluation::False
    );
}

#[test]
fn test_unknown_features_are_unknown() {
    let context = desktop();
    assert_eq!(eval(&context, "(prefers-color-scheme: dark)"), Evaluation::Unknown);
    assert_eq!(eval(&context, "(hover: hover)"), Evaluation::Unknown);
    assert_eq!(eval(&context, "(min-resolution: 2dppx)"), Evaluation::Unknown);
    assert_eq!(eval(&context, "(min-width: calc(100px + 2em))"), Evaluation::Unknown);
    assert_eq!(eval(&context, "(min-width: 30cqw)"), Evaluation::Unknown);
}

#[test]
fn test_unknowns_only_matter_when_they_can_change_the_result() {
    let context = desktop();
    assert_eq!(
        eval(&context, "(min-width: 768px) or (hover: hover)"),
        Evaluation::True
    );
    assert_eq!(
        eval(&context, "(max-width: 500px) and (hover: hover)"),
        Evaluation::False
    );
    assert_eq!(
        eval(&context, "(min-width: 768px) and (hover: hover)"),
        Evaluation::Unknown
    );
    assert_eq!(eval(&context, "print and (hover: hover)"), Evaluation::False);
    assert_eq!(eval(&context, "not (hover: hover)"), Evaluation::Unknown);
}

#[test]
fn test_malformed_query_is_not_all() {
    let context = desktop();
    let evaluation = context.evaluate_list("(min-width: big)");
    assert!(evaluation.malformed);
    assert_eq!(evaluation.result, Evaluation::False);

    let evaluation = context.evaluate_list("(min-width: 10px) and or (max-width: 20px)");
    assert!(evaluation.malformed);

    // A broken query does not poison the rest of the list.
    let evaluation = context.evaluate_list("screen and, (min-width: 100px)");
    assert!(evaluation.malformed);
    assert_eq!(evaluation.result, Evaluation::True);
}

#[test]
fn test_supports_is_undecidable() {
    assert_eq!(evaluate_supports(""), Evaluation::True);
    assert_eq!(evaluate_supports("true"), Evaluation::True);
    assert_eq!(evaluate_supports("(display: grid)"), Evaluation::Unknown);
    assert_eq!(evaluate_supports("not (display: grid)"), Evaluation::Unknown);
}
