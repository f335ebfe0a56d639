use csv::{QuoteStyle, WriterBuilder};

use crate::models::{AGAINST, BallotRecord, FOR, Question, ResultTally, votes_header};

/// One tally per question, in question order. Answers other than the
/// for/against tokens count toward neither.
pub fn tally(questions: &[Question], records: &[BallotRecord]) -> Vec<ResultTally> {
    questions
        .iter()
        .enumerate()
        .map(|(position, question)| {
            let mut result = ResultTally {
                question: question.text.clone(),
                for_count: 0,
                against_count: 0,
            };

            for answer in records.iter().filter_map(|record| record.answer(position)) {
                if answer == FOR {
                    result.for_count += 1;
                } else if answer == AGAINST {
                    result.against_count += 1;
                }
            }

            result
        })
        .collect()
}

/// Header names at least `questions` pairs, more if a record is wider. Then
/// one row per ballot.
pub fn render_csv(records: &[BallotRecord], questions: usize) -> Result<String, csv::Error> {
    let width = records
        .iter()
        .map(|record| record.entries.len())
        .max()
        .unwrap_or_default()
        .max(questions);

    let mut writer = WriterBuilder::new()
        .flexible(true)
        .quote_style(QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(votes_header(width))?;

    for record in records {
        writer.write_record(record.cells())?;
    }

    let bytes = writer.into_inner().map_err(io_error)?;

    String::from_utf8(bytes).map_err(io_error)
}

fn io_error(error: impl ToString) -> csv::Error {
    csv::Error::from(std::io::Error::other(error.to_string()))
}
