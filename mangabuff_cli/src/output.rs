use mangabuff_lib::club::{BoostCard, CardDemand};
use mangabuff_lib::{CardEntry, RunStats};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Clone, Debug)]
pub enum OutputFormat {
    Table,
    Json,
    Markdown,
}

#[derive(Tabled, Serialize)]
struct CardRow {
    #[tabled(rename = "Instance")]
    #[serde(rename = "Instance")]
    instance: String,
    #[tabled(rename = "Card")]
    #[serde(rename = "Card")]
    card: String,
    #[tabled(rename = "Rank")]
    #[serde(rename = "Rank")]
    rank: String,
    #[tabled(rename = "Title")]
    #[serde(rename = "Title")]
    title: String,
}

#[derive(Tabled, Serialize)]
struct CounterRow {
    #[tabled(rename = "Counter")]
    counter: &'static str,
    #[tabled(rename = "Value")]
    value: u64,
}

#[derive(Serialize)]
struct BoostReport<'a> {
    #[serde(flatten)]
    boost: &'a BoostCard,
    owners: u64,
    wanters: u64,
}

// -- Row builders --

fn id_or_dash(id: Option<i64>) -> String {
    id.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn build_card_rows(cards: &[CardEntry]) -> Vec<CardRow> {
    cards
        .iter()
        .map(|c| CardRow {
            instance: id_or_dash(c.instance_id),
            card: id_or_dash(c.card_id),
            rank: c.rank.clone(),
            title: c.title.clone(),
        })
        .collect()
}

fn build_stats_rows(stats: &RunStats) -> Vec<CounterRow> {
    vec![
        CounterRow { counter: "Pages checked", value: stats.checked_pages },
        CounterRow { counter: "Owners seen", value: stats.owners_seen },
        CounterRow { counter: "Trades attempted", value: stats.trades_attempted },
        CounterRow { counter: "Trades succeeded", value: stats.trades_succeeded },
        CounterRow { counter: "Skipped (no own cards)", value: stats.skipped_no_my_cards },
    ]
}

fn render<T: Tabled>(rows: Vec<T>, format: &OutputFormat) -> String {
    let mut table = Table::new(rows);
    if let OutputFormat::Markdown = format {
        table.with(Style::markdown());
    }
    table.to_string()
}

pub fn print_cards(cards: &[CardEntry], format: &OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&cards),
        _ => println!("{}", render(build_card_rows(cards), format)),
    }
}

pub fn print_stats(stats: &RunStats, format: &OutputFormat) {
    match format {
        OutputFormat::Json => print_json(stats),
        _ => println!("{}", render(build_stats_rows(stats), format)),
    }
}

pub fn print_boost(boost: &BoostCard, demand: &CardDemand, format: &OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&BoostReport {
            boost,
            owners: demand.owners,
            wanters: demand.wanters,
        }),
        _ => {
            let rows = vec![
                CounterRow { counter: "Card", value: boost.card_id as u64 },
                CounterRow { counter: "Taken from user", value: boost.owner_id as u64 },
                CounterRow { counter: "Owners", value: demand.owners },
                CounterRow { counter: "Wanters", value: demand.wanters },
            ];
            println!("{}", render(rows, format));
        }
    }
}

pub fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_rows_dash_missing_ids() {
        let cards = vec![
            CardEntry {
                instance_id: Some(900),
                card_id: Some(77),
                rank: "A".to_string(),
                title: "Rem".to_string(),
                href: "/cards/77/users".to_string(),
            },
            CardEntry::default(),
        ];
        let rows = build_card_rows(&cards);
        assert_eq!(rows[0].instance, "900");
        assert_eq!(rows[0].card, "77");
        assert_eq!(rows[1].instance, "-");
        assert_eq!(rows[1].card, "-");
    }

    #[test]
    fn stats_rows_in_run_order() {
        let stats = RunStats {
            checked_pages: 1,
            owners_seen: 2,
            trades_attempted: 1,
            trades_succeeded: 0,
            skipped_no_my_cards: 0,
        };
        let values: Vec<u64> = build_stats_rows(&stats).iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1, 2, 1, 0, 0]);
    }

    #[test]
    fn markdown_table_has_pipe_header() {
        let rendered = render(build_stats_rows(&RunStats::default()), &OutputFormat::Markdown);
        let header = rendered.lines().next().unwrap();
        assert!(header.starts_with('|'));
        assert!(header.contains("Counter"));
    }

    #[test]
    fn boost_report_flattens_card() {
        let boost = BoostCard {
            card_id: 77,
            owner_id: 6,
            card: CardEntry {
                instance_id: Some(41),
                card_id: Some(77),
                ..CardEntry::default()
            },
        };
        let report = BoostReport {
            boost: &boost,
            owners: 74,
            wanters: 1,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["card_id"], 77);
        assert_eq!(json["card"]["id"], 41);
        assert_eq!(json["owners"], 74);
    }
}
