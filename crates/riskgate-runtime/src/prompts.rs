//! Oracle prompts.
//!
//! One prompt asks about exactly one rule. The layout is fixed so answers
//! stay comparable across rules:
//! 1. Instruction preamble
//! 2. The data (`### Transaction` + optional `### History`, or `### Data`)
//! 3. `### Rule`, `### Question`, then an open `### Answer` block

/// Instruction preamble shared by every oracle prompt.
///
/// Identifier and hash fields have already been removed from the data, so
/// the oracle is told to judge the record's content only.
pub const PREAMBLE: &str = "You are a risk analyst reviewing financial transactions. \
Decide whether the given rule applies to the data below. \
Judge only from the data shown; do not assume facts that are not present. \
Reply with exactly one word: yes or no.";

/// The closing question, asked identically for every rule.
pub const QUESTION: &str =
    "Does the rule apply to the transaction? Answer with a single word: yes or no.";

/// Prompt for a schema-valid request: current record plus its history.
///
/// `history` is omitted entirely when `None` or blank.
pub fn rule_prompt(transaction: &str, history: Option<&str>, condition: &str) -> String {
    let mut prompt = format!("{}\n\n### Transaction\n{}\n\n", PREAMBLE, transaction);
    if let Some(history) = history.filter(|h| !h.trim().is_empty()) {
        prompt.push_str(&format!("### History\n{}\n\n", history));
    }
    push_rule_and_question(&mut prompt, condition);
    prompt
}

/// Prompt for a request that failed schema validation: the whole payload is
/// shown as one data block.
pub fn data_prompt(data: &str, condition: &str) -> String {
    let mut prompt = format!("{}\n\n### Data\n{}\n\n", PREAMBLE, data);
    push_rule_and_question(&mut prompt, condition);
    prompt
}

fn push_rule_and_question(prompt: &mut String, condition: &str) {
    prompt.push_str(&format!(
        "### Rule\n{}\n\n### Question\n{}\n\n### Answer\n",
        condition.trim(),
        QUESTION
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_prompt_layout() {
        let prompt = rule_prompt("amount: 50", None, "merchant looks unusual");
        let expected = format!(
            "{}\n\n### Transaction\namount: 50\n\n### Rule\nmerchant looks unusual\n\n\
             ### Question\n{}\n\n### Answer\n",
            PREAMBLE, QUESTION
        );
        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_history_block_only_when_present() {
        let with = rule_prompt("amount: 50", Some("amount: 20\namount: 30"), "r");
        assert!(with.contains("### History\namount: 20\namount: 30\n\n### Rule"));

        let blank = rule_prompt("amount: 50", Some(""), "r");
        assert!(!blank.contains("### History"));
    }

    #[test]
    fn test_data_prompt_has_no_transaction_block() {
        let prompt = data_prompt("amount: lots", "amount is large");
        assert!(prompt.contains("### Data\namount: lots\n\n### Rule\namount is large"));
        assert!(!prompt.contains("### Transaction"));
        assert!(prompt.ends_with("### Answer\n"));
    }
}
