use serde::{Deserialize, Serialize};

/// Closed set of coaching contexts. Each context owns its prompt, its
/// response schema and its empty-data message; nothing about one context
/// leaks into another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoachContext {
    General,
    PnlAnalysis,
    AffordabilityAnalysis,
    NetSheetAnalysis,
}

impl CoachContext {
    /// Parse a request tag. Unknown tags fail closed to `General` here,
    /// at construction time, so no downstream component ever sees an
    /// unvalidated context.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "pnl_analysis" => CoachContext::PnlAnalysis,
            "affordability_analysis" => CoachContext::AffordabilityAnalysis,
            "net_sheet_analysis" => CoachContext::NetSheetAnalysis,
            _ => CoachContext::General,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            CoachContext::General => "general",
            CoachContext::PnlAnalysis => "pnl_analysis",
            CoachContext::AffordabilityAnalysis => "affordability_analysis",
            CoachContext::NetSheetAnalysis => "net_sheet_analysis",
        }
    }
}

/// Everything the pipeline needs to drive one context: prompt, schema,
/// cardinality cap, and the deterministic empty-data message.
pub struct ContextRoute {
    pub system_prompt: &'static str,
    pub required_keys: &'static [&'static str],
    pub max_actions: usize,
    pub empty_data_message: &'static str,
}

const COACH_KEYS: &[&str] = &["summary", "stats", "actions", "risks", "next_inputs"];

const GENERAL_PROMPT: &str = "\
You are a business coach for residential real-estate agents. You will receive \
the agent's goal settings, a 28-day activity rollup, recent reflections and a \
year-to-date P&L summary as JSON. Respond with a single JSON object and nothing \
else - no markdown, no code fences. Required keys: \"summary\" (2-3 plain \
sentences, encouraging but direct), \"stats\" (object of the 3-5 most relevant \
numbers you used, values as plain numbers), \"actions\" (array of at most 3 \
specific next steps, each one sentence), \"risks\" (array of at most 3 short \
risk statements), \"next_inputs\" (array of data the agent should log next). \
Round currency to whole dollars. Never invent numbers not present in the input.";

const PNL_PROMPT: &str = "\
You are a financial analyst for a solo real-estate business. You will receive \
the current month's income and expenses, up to six months of history, and the \
caller's focus areas as JSON. Respond with a single JSON object and nothing \
else - no markdown, no code fences. Required keys: \"summary\" (2-3 sentences \
on profitability and trend), \"stats\" (object with net income, margin and the \
figures behind them), \"actions\" (array of at most 4 cost or revenue moves), \
\"risks\" (array of at most 3 exposure statements), \"next_inputs\" (array of \
missing records that would sharpen the analysis). Round currency to whole \
dollars. Address the caller's focus areas first when any are given.";

const AFFORDABILITY_PROMPT: &str = "\
You are helping a real-estate agent sanity-check a buyer's affordability. You \
will receive structured numeric inputs (home price, income, debts, rate, down \
payment) as JSON. Respond with a single JSON object and nothing else - no \
markdown, no code fences. Required keys: \"summary\" (2-3 sentences on whether \
the numbers work), \"stats\" (object with estimated payment, DTI and the inputs \
used), \"actions\" (array of at most 3 steps to improve the picture), \"risks\" \
(array of at most 3 qualification risks), \"next_inputs\" (array of inputs that \
were missing or assumed). Use only the numbers provided; state assumptions.";

const NET_SHEET_PROMPT: &str = "\
You are preparing a seller net-sheet review for a real-estate agent. You will \
receive structured numeric inputs (sale price, commission, payoffs, closing \
costs) as JSON. Respond with a single JSON object and nothing else - no \
markdown, no code fences. Required keys: \"summary\" (2-3 sentences on the \
seller's expected net), \"stats\" (object with estimated net proceeds and each \
deduction used), \"actions\" (array of at most 3 ways to protect the net), \
\"risks\" (array of at most 3 items that could erode proceeds), \"next_inputs\" \
(array of figures still needed for an exact sheet). Use only the numbers \
provided; state assumptions.";

/// Total routing function. Adding a context means adding one enum variant
/// and one arm here - no other component changes.
pub fn route(context: CoachContext) -> ContextRoute {
    match context {
        CoachContext::General => ContextRoute {
            system_prompt: GENERAL_PROMPT,
            required_keys: COACH_KEYS,
            max_actions: 3,
            empty_data_message: "Set up your goals and log a few days of activity, \
                 then I can start coaching you with real numbers.",
        },
        CoachContext::PnlAnalysis => ContextRoute {
            system_prompt: PNL_PROMPT,
            required_keys: COACH_KEYS,
            max_actions: 4,
            empty_data_message: "No income or expense records yet for this period. \
                 Add a closed deal or an expense and run the analysis again.",
        },
        CoachContext::AffordabilityAnalysis => ContextRoute {
            system_prompt: AFFORDABILITY_PROMPT,
            required_keys: COACH_KEYS,
            max_actions: 3,
            empty_data_message: "Provide the buyer's numbers (home price, income, \
                 monthly debts, down payment) to run an affordability check.",
        },
        CoachContext::NetSheetAnalysis => ContextRoute {
            system_prompt: NET_SHEET_PROMPT,
            required_keys: COACH_KEYS,
            max_actions: 3,
            empty_data_message: "Provide the sale numbers (price, commission rate, \
                 loan payoff) to estimate the seller's net proceeds.",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tag_fails_closed_to_general() {
        assert_eq!(CoachContext::from_tag("market_forecast"), CoachContext::General);
        assert_eq!(CoachContext::from_tag(""), CoachContext::General);
        // Case matters: tags are produced by our own clients
        assert_eq!(CoachContext::from_tag("PNL_ANALYSIS"), CoachContext::General);
    }

    #[test]
    fn tag_round_trip() {
        for ctx in [
            CoachContext::General,
            CoachContext::PnlAnalysis,
            CoachContext::AffordabilityAnalysis,
            CoachContext::NetSheetAnalysis,
        ] {
            assert_eq!(CoachContext::from_tag(ctx.as_tag()), ctx);
        }
    }

    #[test]
    fn every_context_routes_with_full_schema() {
        for ctx in [
            CoachContext::General,
            CoachContext::PnlAnalysis,
            CoachContext::AffordabilityAnalysis,
            CoachContext::NetSheetAnalysis,
        ] {
            let r = route(ctx);
            for key in ["summary", "stats", "actions", "risks", "next_inputs"] {
                assert!(r.required_keys.contains(&key), "{:?} missing {}", ctx, key);
            }
            assert!(!r.system_prompt.is_empty());
            assert!(!r.empty_data_message.is_empty());
            assert!(r.max_actions >= 1);
        }
    }

    #[test]
    fn prompts_do_not_share_domain_vocabulary() {
        // Dashboard coaching language must not bleed into the calculators
        let afford = route(CoachContext::AffordabilityAnalysis).system_prompt;
        assert!(!afford.contains("28-day"));
        assert!(!afford.contains("reflections"));
        let general = route(CoachContext::General).system_prompt;
        assert!(!general.contains("net-sheet"));
        assert!(!general.contains("down payment"));
    }
}
