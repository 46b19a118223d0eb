use serde::Serialize;
use strsim::jaro_winkler;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CourtKind {
    Federal,
    State,
    Specialized,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CourtInfo {
    pub name: &'static str,
    pub jurisdiction: &'static str,
    pub kind: CourtKind,
    pub location: &'static str,
}

pub static COURTS: [CourtInfo; 5] = [
    CourtInfo {
        name: "Supreme Court of Nigeria",
        jurisdiction: "Highest court in Nigeria. Appellate jurisdiction over Court of Appeal decisions.",
        kind: CourtKind::Federal,
        location: "Abuja",
    },
    CourtInfo {
        name: "Court of Appeal",
        jurisdiction: "Appeals from Federal High Court, State High Courts, etc.",
        kind: CourtKind::Federal,
        location: "Various Divisions",
    },
    CourtInfo {
        name: "Federal High Court",
        jurisdiction: "Matters related to federal revenue, taxation, customs, companies, IP.",
        kind: CourtKind::Federal,
        location: "All States",
    },
    CourtInfo {
        name: "National Industrial Court",
        jurisdiction: "Labor, employment, industrial relations matters.",
        kind: CourtKind::Specialized,
        location: "All States",
    },
    CourtInfo {
        name: "State High Court",
        jurisdiction: "General civil and criminal jurisdiction not exclusive to Federal High Court.",
        kind: CourtKind::State,
        location: "Each State",
    },
];

const MIN_SIMILARITY: f64 = 0.75;

fn score(court: &CourtInfo, query: &str) -> f64 {
    let name = court.name.to_lowercase();
    if name.contains(query) {
        return 1.0;
    }
    let whole = jaro_winkler(&name, query);
    let best_word = name
        .split_whitespace()
        .flat_map(|word| query.split_whitespace().map(move |q| jaro_winkler(word, q)))
        .fold(0.0, f64::max);
    whole.max(best_word)
}

/// Courts whose name resembles `query`, best match first. A blank query lists
/// the whole directory.
pub fn search(query: &str) -> Vec<&'static CourtInfo> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return COURTS.iter().collect();
    }

    let mut scored: Vec<(f64, &'static CourtInfo)> = COURTS
        .iter()
        .map(|court| (score(court, &query), court))
        .filter(|(s, _)| *s >= MIN_SIMILARITY)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, court)| court).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_query_lists_all_courts_in_order() {
        let all = search("  ");
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].name, "Supreme Court of Nigeria");
        assert_eq!(all[4].kind, CourtKind::State);
    }

    #[test]
    fn substring_match_ranks_first() {
        let hits = search("industrial");
        assert_eq!(hits[0].name, "National Industrial Court");
    }

    #[test]
    fn tolerates_typos() {
        let hits = search("Supreem");
        assert_eq!(hits.first().map(|c| c.name), Some("Supreme Court of Nigeria"));
    }

    #[test]
    fn unrelated_query_finds_nothing() {
        assert!(search("xylophone").is_empty());
    }
}
