//! Record parser for `birdcl show protocols all` output.
//!
//! The output is a sequence of protocol records separated by blank lines.
//! Each record starts with a header line (`name proto table state since info`)
//! followed by indented detail lines. The parser is a two-state machine:
//!
//! ```text
//!              header line
//! HeaderExpected ─────────> InRecord ──┐ detail line
//!       ^                      │  ^    │
//!       └──── blank line ──────┘  └────┘
//! ```
//!
//! The "Route change stats:" line announces the column names used by the
//! following `Import`/`Export` counter lines, so it is kept per record.

use std::collections::VecDeque;
use std::io::{self, BufRead};

use tracing::trace;

use crate::error::{Error, Result};
use crate::metric::{ACTION_LABEL, DIRECTION_LABEL, Metric, OUTCOME_LABEL, ROUTE_TYPE_LABEL};
use crate::tokens::{SkipGarbage, TokenLine, Tokens, skip_garbage, tokenize};

/// Marker for a route change counter BIRD does not track.
const NOT_TRACKED: &str = "---";

/// Full parsing pipeline over a buffered reader.
pub type ShowProtocols<R> = ProtocolParser<SkipGarbage<Tokens<io::Lines<R>>>>;

/// Parse the output of `birdcl show protocols all`.
///
/// The returned iterator reads lazily from `reader`; dropping it early leaves
/// the rest of the input unread.
pub fn parse_show_protocols<R: BufRead>(reader: R) -> ShowProtocols<R> {
    ProtocolParser::new(skip_garbage(tokenize(reader.lines())))
}

/// Parse `birdcl show protocols all` output held in memory.
pub fn parse_str(text: &str) -> ShowProtocols<&[u8]> {
    parse_show_protocols(text.as_bytes())
}

enum State {
    HeaderExpected,
    InRecord(Record),
    Done,
}

/// The protocol record currently being parsed.
struct Record {
    instance: String,
    /// Outcome column names from "Route change stats:".
    schema: Option<Vec<String>>,
}

impl Record {
    /// Start a record from its header line, returning its `bird_up` metric.
    fn open(line: &TokenLine) -> Result<(Self, Metric)> {
        if line.tokens.len() < 4 {
            return Err(Error::ShortHeader {
                line: line.number,
                tokens: line.tokens.len(),
            });
        }

        let instance = line.tokens[0].clone();
        let up = Metric::new("bird_up", &instance, i64::from(line.tokens[3] == "up"));
        trace!(instance = %instance, state = %line.tokens[3], "Protocol record");

        Ok((
            Self {
                instance,
                schema: None,
            },
            up,
        ))
    }

    /// Convert one detail line into metrics.
    ///
    /// Either all metrics for the line are returned or none are.
    fn dispatch(&mut self, line: &TokenLine) -> Result<Vec<Metric>> {
        match line.as_strs().as_slice() {
            ["Preference:", rest @ ..] => {
                let value = rest.first().ok_or_else(|| Error::MalformedLine {
                    line: line.number,
                    field: "Preference",
                    reason: "missing value".to_string(),
                })?;
                Ok(vec![Metric::new(
                    "bird_preference",
                    &self.instance,
                    parse_int(line, "Preference", value)?,
                )])
            }
            ["Routes:", rest @ ..] => self.routes(line, rest),
            ["Route", "change", "stats:", outcomes @ ..] => {
                self.schema = Some(outcomes.iter().map(|o| o.to_string()).collect());
                Ok(Vec::new())
            }
            [
                direction @ ("Import" | "Export"),
                action @ ("updates:" | "withdraws:"),
                counts @ ..,
            ] => self.route_changes(line, direction, action, counts),
            ["Hold", "timer:", rest @ ..] => self.timer(
                line,
                "Hold timer",
                ["bird_hold_timer_current", "bird_hold_timer_initial"],
                rest,
            ),
            ["Keepalive", "timer:", rest @ ..] => self.timer(
                line,
                "Keepalive timer",
                ["bird_keepalive_timer_current", "bird_keepalive_timer_initial"],
                rest,
            ),
            _ => {
                trace!(line = line.number, "Ignoring unrecognised line");
                Ok(Vec::new())
            }
        }
    }

    /// `Routes: 1 imported, 0 exported, 1 preferred`
    fn routes(&self, line: &TokenLine, rest: &[&str]) -> Result<Vec<Metric>> {
        if rest.len() % 2 != 0 {
            return Err(Error::MalformedLine {
                line: line.number,
                field: "Routes",
                reason: format!("{} tokens do not form count/type pairs", rest.len()),
            });
        }

        rest.chunks_exact(2)
            .map(|pair| -> Result<Metric> {
                let count = parse_int(line, "Routes", pair[0])?;
                let route_type = pair[1].strip_suffix(',').unwrap_or(pair[1]);
                Ok(Metric::new("bird_routes", &self.instance, count)
                    .with_label(ROUTE_TYPE_LABEL, route_type))
            })
            .collect()
    }

    /// `Import updates: 1 0 --- 0 1`
    fn route_changes(
        &self,
        line: &TokenLine,
        direction: &str,
        action: &str,
        counts: &[&str],
    ) -> Result<Vec<Metric>> {
        let schema = self.schema.as_ref().ok_or_else(|| Error::MissingSchema {
            line: line.number,
            instance: self.instance.clone(),
        })?;

        if schema.len() != counts.len() {
            return Err(Error::ColumnMismatch {
                line: line.number,
                columns: counts.len(),
                expected: schema.len(),
            });
        }

        let direction = direction.to_lowercase();
        let action = action.strip_suffix(':').unwrap_or(action);

        schema
            .iter()
            .zip(counts)
            .filter(|(_, count)| **count != NOT_TRACKED)
            .map(|(outcome, count)| -> Result<Metric> {
                Ok(Metric::new(
                    "bird_route_changes",
                    &self.instance,
                    parse_int(line, "route change counter", count)?,
                )
                .with_label(DIRECTION_LABEL, direction.as_str())
                .with_label(ACTION_LABEL, action)
                .with_label(OUTCOME_LABEL, outcome.as_str()))
            })
            .collect()
    }

    /// `Hold timer: 177/240`
    fn timer(
        &self,
        line: &TokenLine,
        field: &'static str,
        [current_name, initial_name]: [&'static str; 2],
        rest: &[&str],
    ) -> Result<Vec<Metric>> {
        let malformed = |reason: &str| Error::MalformedLine {
            line: line.number,
            field,
            reason: reason.to_string(),
        };

        let value = rest.first().ok_or_else(|| malformed("missing value"))?;
        let (current, initial) = match value.split('/').collect::<Vec<_>>().as_slice() {
            [current, initial] => (*current, *initial),
            _ => return Err(malformed("expected current/initial")),
        };

        Ok(vec![
            Metric::new(current_name, &self.instance, parse_int(line, field, current)?),
            Metric::new(initial_name, &self.instance, parse_int(line, field, initial)?),
        ])
    }
}

fn parse_int(line: &TokenLine, field: &'static str, value: &str) -> Result<i64> {
    value.parse().map_err(|_| Error::InvalidInteger {
        line: line.number,
        field,
        value: value.to_string(),
    })
}

/// Lazy metric producer over a filtered token line stream.
///
/// Yields `Err` at most once; afterwards the iterator is exhausted.
pub struct ProtocolParser<I> {
    lines: I,
    state: State,
    pending: VecDeque<Metric>,
}

impl<I> ProtocolParser<I>
where
    I: Iterator<Item = Result<TokenLine>>,
{
    /// Create a parser over lines with the banner and column header removed.
    pub fn new(lines: I) -> Self {
        Self {
            lines,
            state: State::HeaderExpected,
            pending: VecDeque::new(),
        }
    }

    fn step(&mut self, line: TokenLine) -> Result<()> {
        // Any early return through `?` leaves the parser in `Done`.
        self.state = match std::mem::replace(&mut self.state, State::Done) {
            State::HeaderExpected => {
                let (record, up) = Record::open(&line)?;
                self.pending.push_back(up);
                State::InRecord(record)
            }
            State::InRecord(_) if line.is_blank() => State::HeaderExpected,
            State::InRecord(mut record) => {
                self.pending.extend(record.dispatch(&line)?);
                State::InRecord(record)
            }
            State::Done => State::Done,
        };
        Ok(())
    }
}

impl<I> Iterator for ProtocolParser<I>
where
    I: Iterator<Item = Result<TokenLine>>,
{
    type Item = Result<Metric>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(metric) = self.pending.pop_front() {
                return Some(Ok(metric));
            }
            if matches!(self.state, State::Done) {
                return None;
            }

            let step = match self.lines.next() {
                Some(Ok(line)) => self.step(line),
                Some(Err(e)) => Err(e),
                None => {
                    self.state = State::Done;
                    return None;
                }
            };

            if let Err(e) = step {
                self.state = State::Done;
                return Some(Err(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Vec<String>> {
        parse_str(text)
            .map(|m| m.map(|m| m.to_string()))
            .collect()
    }

    fn record(lines: &[&str]) -> String {
        let mut text = String::from("p1 BGP master up 2016-10-23\n");
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("BIRD 1.5.0 ready.\n").unwrap().is_empty());
    }

    #[test]
    fn test_static_preference() {
        let text = "BIRD 1.5.0 ready.\n\
                    name     proto    table    state  since       info\n\
                    static1  Static   master   up     2016-10-21\n\
                    \x20 Preference:     200\n\
                    \n";
        assert_eq!(
            parse(text).unwrap(),
            vec![
                "bird_up{bird_protocol_instance=\"static1\"} 1",
                "bird_preference{bird_protocol_instance=\"static1\"} 200",
            ]
        );
    }

    #[test]
    fn test_up_is_zero_when_not_up() {
        let out = parse("Mesh_1 BGP master start 2016-10-23 Active\n").unwrap();
        assert_eq!(out, vec!["bird_up{bird_protocol_instance=\"Mesh_1\"} 0"]);
    }

    #[test]
    fn test_routes() {
        let out = parse(&record(&["  Routes:   1 imported, 0 exported, 1 preferred"])).unwrap();
        assert_eq!(
            out[1..],
            [
                "bird_routes{bird_protocol_instance=\"p1\",bird_route_type=\"imported\"} 1",
                "bird_routes{bird_protocol_instance=\"p1\",bird_route_type=\"exported\"} 0",
                "bird_routes{bird_protocol_instance=\"p1\",bird_route_type=\"preferred\"} 1",
            ]
        );
    }

    #[test]
    fn test_routes_odd_tokens() {
        let err = parse(&record(&["Routes: 1 imported, 0"])).unwrap_err();
        assert!(matches!(err, Error::MalformedLine { line: 2, field: "Routes", .. }));
    }

    #[test]
    fn test_import_updates() {
        let out = parse(&record(&[
            "Route change stats:     received   rejected   filtered    ignored   accepted",
            "  Import updates:              1          0          0          0          1",
        ]))
        .unwrap();

        assert_eq!(out.len(), 6);
        assert_eq!(
            out[1],
            "bird_route_changes{bird_protocol_instance=\"p1\",bird_direction=\"import\",\
             bird_action=\"updates\",bird_outcome=\"received\"} 1"
        );
        assert!(out[5].contains("bird_outcome=\"accepted\"} 1"));
    }

    #[test]
    fn test_not_tracked_columns_are_skipped() {
        let out = parse(&record(&[
            "Route change stats: received rejected filtered ignored accepted",
            "Export withdraws: 0 --- --- --- 0",
        ]))
        .unwrap();

        assert_eq!(out.len(), 3);
        assert!(out[1].contains(
            "bird_direction=\"export\",bird_action=\"withdraws\",bird_outcome=\"received\"} 0"
        ));
        assert!(out[2].contains("bird_outcome=\"accepted\"} 0"));
    }

    #[test]
    fn test_counters_before_schema() {
        let err = parse(&record(&["Import updates: 1 0 0 0 1"])).unwrap_err();
        assert!(matches!(err, Error::MissingSchema { line: 2, ref instance } if instance == "p1"));
    }

    #[test]
    fn test_schema_does_not_leak_across_records() {
        let text = "p1 BGP master up x\n\
                    Route change stats: received accepted\n\
                    \n\
                    p2 BGP master up x\n\
                    Import updates: 1 1\n";
        let err = parse(text).unwrap_err();
        assert!(matches!(err, Error::MissingSchema { line: 5, ref instance } if instance == "p2"));
    }

    #[test]
    fn test_schema_is_replaced() {
        let out = parse(&record(&[
            "Route change stats: a b",
            "Route change stats: c",
            "Import updates: 7",
        ]))
        .unwrap();
        assert_eq!(out.len(), 2);
        assert!(out[1].contains("bird_outcome=\"c\"} 7"));
    }

    #[test]
    fn test_column_mismatch() {
        let err = parse(&record(&[
            "Route change stats: received rejected filtered ignored accepted",
            "Import updates: 1 0 0",
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            Error::ColumnMismatch { line: 3, columns: 3, expected: 5 }
        ));
    }

    #[test]
    fn test_timers() {
        let out = parse(&record(&["Hold timer: 177/240", "Keepalive timer: 61/80"])).unwrap();
        assert_eq!(
            out[1..],
            [
                "bird_hold_timer_current{bird_protocol_instance=\"p1\"} 177",
                "bird_hold_timer_initial{bird_protocol_instance=\"p1\"} 240",
                "bird_keepalive_timer_current{bird_protocol_instance=\"p1\"} 61",
                "bird_keepalive_timer_initial{bird_protocol_instance=\"p1\"} 80",
            ]
        );
    }

    #[test]
    fn test_timer_without_slash() {
        let err = parse(&record(&["Hold timer: 177"])).unwrap_err();
        assert!(matches!(err, Error::MalformedLine { field: "Hold timer", .. }));
    }

    #[test]
    fn test_timer_with_extra_slash() {
        let err = parse(&record(&["Keepalive timer: 1/2/3"])).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedLine { line: 2, field: "Keepalive timer", .. }
        ));
    }

    #[test]
    fn test_negative_values_pass_through() {
        let out = parse(&record(&["Preference: -3"])).unwrap();
        assert_eq!(out[1], "bird_preference{bird_protocol_instance=\"p1\"} -3");
    }

    #[test]
    fn test_invalid_integer() {
        let err = parse(&record(&["Preference: high"])).unwrap_err();
        match err {
            Error::InvalidInteger { line, field, value } => {
                assert_eq!(line, 2);
                assert_eq!(field, "Preference");
                assert_eq!(value, "high");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_short_header() {
        let err = parse("p1 BGP master\n").unwrap_err();
        assert!(matches!(err, Error::ShortHeader { line: 1, tokens: 3 }));
    }

    #[test]
    fn test_unknown_lines_are_ignored() {
        let out = parse(&record(&[
            "Description:    Connection to BGP peer",
            "Input filter:   ACCEPT",
            "Import",
            "Route change",
            "Neighbor address: 10.101.4.114",
        ]))
        .unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_failed_line_emits_nothing() {
        let text = record(&[
            "Route change stats: received rejected",
            "Import updates: 5 x",
        ]);
        let items: Vec<_> = parse_str(&text).collect();

        // bird_up, then the error; the valid "received" column is not released.
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[test]
    fn test_parser_is_fused_after_error() {
        let text = "p1 BGP\np2 BGP master up\n";
        let mut parser = parse_str(text);
        assert!(parser.next().unwrap().is_err());
        assert!(parser.next().is_none());
    }

    #[test]
    fn test_final_record_without_blank_line() {
        let out = parse("a Static master up\n\nb Static master down\nPreference: 1").unwrap();
        assert_eq!(out.len(), 3);
        assert!(out[2].starts_with("bird_preference{bird_protocol_instance=\"b\"}"));
    }

    #[test]
    fn test_extra_blank_line_between_records() {
        let text = "a Static master up\n\n\nb Static master up\n";
        let items: Vec<_> = parse_str(text).collect();

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(
            items[1],
            Err(Error::ShortHeader { line: 3, tokens: 0 })
        ));
    }

    #[test]
    fn test_early_stop_leaves_rest_unread() {
        // The malformed second record is never reached.
        let text = "a Static master up\n\nbroken\n";
        let first = parse_str(text).next().unwrap().unwrap();
        assert_eq!(first.name, "bird_up");
    }
}
