//! Plain-text results view.

use std::fmt::Write;

use crate::quiz::{Question, ScoreReport};

const CHART_WIDTH: usize = 40;

/// Two-segment bar: filled for correct, shaded for incorrect.
pub fn score_chart(report: &ScoreReport, width: usize) -> String {
    if report.total == 0 {
        return format!("[{}]", " ".repeat(width));
    }
    let correct = (report.correct_count * width + report.total / 2) / report.total;
    let correct = correct.min(width);
    format!("[{}{}]", "█".repeat(correct), "░".repeat(width - correct))
}

fn option_line(question: &Question, label: &str) -> String {
    match question.options.get(label) {
        Some(text) => format!("{}. {}", label, text),
        None => label.to_string(),
    }
}

/// Render the score summary and per-question breakdown.
pub fn render(questions: &[Question], report: &ScoreReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Quiz Results");
    let _ = writeln!(out, "============");
    let _ = writeln!(out);
    let _ = writeln!(out, "Your Score: {}%", report.rounded_percentage());
    let _ = writeln!(out, "Total Questions: {}", report.total);
    let _ = writeln!(out, "Correct: {}", report.correct_count);
    let _ = writeln!(out, "Incorrect: {}", report.incorrect_count);
    let _ = writeln!(out, "{}  █ correct  ░ incorrect", score_chart(report, CHART_WIDTH));

    for (i, (question, outcome)) in questions.iter().zip(&report.breakdown).enumerate() {
        let _ = writeln!(out);
        let mark = if outcome.is_correct { "✓" } else { "✗" };
        let _ = writeln!(out, "{} {}. {}", mark, i + 1, question.prompt);
        match &outcome.chosen {
            Some(label) => {
                let _ = writeln!(out, "   Your answer: {}", option_line(question, label));
            }
            None => {
                let _ = writeln!(out, "   Your answer: Not answered");
            }
        }
        if !outcome.is_correct && !question.is_broken() {
            let _ = writeln!(
                out,
                "   Correct answer: {}",
                option_line(question, &question.correct_answer_label)
            );
        }
        if !question.reference.is_empty() {
            let _ = writeln!(out, "   Reference: {}", question.reference);
        }
    }
    out
}
