use crate::models::question::{Donor, Question, QuestionPools};
use crate::service::sheets::SheetsError;

/// Read-only source of question pools and donor contacts.
#[async_trait::async_trait]
pub trait QuestionSource: Send + Sync {
    async fn load_pools(&self) -> Result<QuestionPools, SheetsError>;
    async fn load_donors(&self) -> Result<Vec<Donor>, SheetsError>;
}

fn cell(row: &[String], index: usize) -> String {
    row.get(index).cloned().unwrap_or_default()
}

/// Mirrors a lenient integer parse: optional sign followed by leading digits,
/// anything after the digits is ignored.
fn parse_leading_int(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// The sheet stores the 1-based number of the correct option. Missing, zero
/// or unparsable values fall back to the first option.
fn correct_index(value: Option<&String>) -> usize {
    let number = value.and_then(|v| parse_leading_int(v)).filter(|n| *n != 0).unwrap_or(1);
    usize::try_from(number - 1).unwrap_or(0)
}

/// Columns: prompt, four options, correct option number.
pub fn question_from_row(index: usize, row: &[String]) -> Question {
    Question {
        id: index + 1,
        prompt: cell(row, 0),
        options: [cell(row, 1), cell(row, 2), cell(row, 3), cell(row, 4)],
        correct: correct_index(row.get(5)),
    }
}

pub fn questions_from_rows(rows: &[Vec<String>]) -> Vec<Question> {
    rows.iter().enumerate().map(|(index, row)| question_from_row(index, row)).collect()
}

/// Columns: name, phone. Rows without a phone are dropped.
pub fn donors_from_rows(rows: &[Vec<String>]) -> Vec<Donor> {
    rows.iter()
        .filter_map(|row| {
            let phone = row.get(1).map(|p| p.trim()).filter(|p| !p.is_empty())?;
            Some((cell(row, 0), phone.to_string()))
        })
        .enumerate()
        .map(|(index, (name, phone))| Donor { id: index + 1, name, phone })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn maps_full_question_row() {
        let question = question_from_row(0, &row(&["2 + 2?", "3", "4", "5", "6", "2"]));
        assert_eq!(question.id, 1);
        assert_eq!(question.prompt, "2 + 2?");
        assert_eq!(question.options, ["3", "4", "5", "6"].map(String::from));
        assert_eq!(question.correct, 1);
    }

    #[test]
    fn correct_index_defaults_to_first_option() {
        assert_eq!(question_from_row(0, &row(&["q", "a", "b", "c", "d"])).correct, 0);
        assert_eq!(question_from_row(0, &row(&["q", "a", "b", "c", "d", "abc"])).correct, 0);
        assert_eq!(question_from_row(0, &row(&["q", "a", "b", "c", "d", "0"])).correct, 0);
        assert_eq!(question_from_row(0, &row(&["q", "a", "b", "c", "d", "-3"])).correct, 0);
        assert_eq!(question_from_row(0, &row(&["q", "a", "b", "c", "d", ""])).correct, 0);
    }

    #[test]
    fn correct_index_uses_leading_digits() {
        assert_eq!(question_from_row(0, &row(&["q", "a", "b", "c", "d", "4"])).correct, 3);
        assert_eq!(question_from_row(0, &row(&["q", "a", "b", "c", "d", " 3rd"])).correct, 2);
    }

    #[test]
    fn short_rows_get_empty_cells() {
        let question = question_from_row(4, &row(&["only a prompt"]));
        assert_eq!(question.id, 5);
        assert_eq!(question.options, [String::new(), String::new(), String::new(), String::new()]);
    }

    #[test]
    fn question_ids_follow_row_position() {
        let rows = vec![row(&["q1"]), row(&["q2"]), row(&["q3"])];
        let ids: Vec<usize> = questions_from_rows(&rows).iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn donors_without_phone_are_dropped_and_phones_trimmed() {
        let rows = vec![
            row(&["Alice", " 0901 234 567 "]),
            row(&["Bob", ""]),
            row(&["Carol"]),
            row(&["Dan", "   "]),
            row(&["", "0912"]),
        ];

        let donors = donors_from_rows(&rows);
        assert_eq!(
            donors,
            vec![
                Donor {
                    id: 1,
                    name: "Alice".to_string(),
                    phone: "0901 234 567".to_string()
                },
                Donor {
                    id: 2,
                    name: String::new(),
                    phone: "0912".to_string()
                },
            ]
        );
    }
}
