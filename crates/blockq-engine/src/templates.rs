use serde::Serialize;

/// Read-only query offered for discovery and autofill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueryTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub query: &'static str,
}

const TEMPLATES: &[QueryTemplate] = &[
    QueryTemplate {
        name: "network-tps",
        description: "Throughput of the most recent sample windows",
        query: "SELECT slot, sampled_at, transactions, tps FROM slots ORDER BY slot DESC LIMIT 20",
    },
    QueryTemplate {
        name: "peak-tps",
        description: "Sample windows with the highest throughput",
        query: "SELECT slot, tps, non_vote_transactions FROM slots ORDER BY tps DESC LIMIT 10",
    },
    QueryTemplate {
        name: "recent-transactions",
        description: "Latest transactions for the tracked address",
        query: "SELECT signature, slot, block_time, status, amount FROM transactions ORDER BY slot DESC LIMIT 25",
    },
    QueryTemplate {
        name: "failed-transactions",
        description: "Transactions that did not succeed",
        query: "SELECT signature, slot, fee FROM transactions WHERE status = 'failed' ORDER BY slot DESC LIMIT 25",
    },
    QueryTemplate {
        name: "largest-transfers",
        description: "Transactions ordered by transferred amount",
        query: "SELECT signature, amount, fee FROM transactions ORDER BY amount DESC LIMIT 10",
    },
    QueryTemplate {
        name: "token-supply",
        description: "Supply of every tracked token mint",
        query: "SELECT symbol, supply, decimals, fetched_at FROM token_supply ORDER BY supply DESC",
    },
    QueryTemplate {
        name: "top-validators",
        description: "Validators with the most activated stake",
        query: "SELECT vote_pubkey, activated_stake, commission FROM validators ORDER BY activated_stake DESC LIMIT 10",
    },
    QueryTemplate {
        name: "delinquent-validators",
        description: "Validators that have stopped voting",
        query: "SELECT vote_pubkey, node_pubkey, last_vote FROM validators WHERE delinquent = TRUE",
    },
    QueryTemplate {
        name: "low-commission",
        description: "Active validators charging at most 5% commission",
        query: "SELECT vote_pubkey, commission, activated_stake FROM validators WHERE commission <= 5 AND delinquent = FALSE ORDER BY activated_stake DESC",
    },
];

pub fn templates() -> &'static [QueryTemplate] {
    TEMPLATES
}

pub fn find_template(name: &str) -> Option<&'static QueryTemplate> {
    TEMPLATES.iter().find(|t| t.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_template_parses() {
        for template in templates() {
            if let Err(e) = blockq_parser::parse(template.query) {
                panic!("template '{}' does not parse: {}", template.name, e);
            }
        }
    }

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<_> = templates().iter().map(|t| t.name).collect();
        assert_eq!(names.len(), templates().len());
    }

    #[test]
    fn test_find_template() {
        assert!(find_template("PEAK-TPS").is_some());
        assert!(find_template("missing").is_none());
    }
}
