use std::fmt;

/// The part an agent plays in the analysis graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    MarketAnalyst,
    SocialAnalyst,
    NewsAnalyst,
    FundamentalsAnalyst,
    BullResearcher,
    BearResearcher,
    ResearchManager,
    Trader,
    RiskManager,
}

impl AgentRole {
    pub const ALL: [AgentRole; 9] = [
        AgentRole::MarketAnalyst,
        AgentRole::SocialAnalyst,
        AgentRole::NewsAnalyst,
        AgentRole::FundamentalsAnalyst,
        AgentRole::BullResearcher,
        AgentRole::BearResearcher,
        AgentRole::ResearchManager,
        AgentRole::Trader,
        AgentRole::RiskManager,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::MarketAnalyst => "market_analyst",
            AgentRole::SocialAnalyst => "social_analyst",
            AgentRole::NewsAnalyst => "news_analyst",
            AgentRole::FundamentalsAnalyst => "fundamentals_analyst",
            AgentRole::BullResearcher => "bull_researcher",
            AgentRole::BearResearcher => "bear_researcher",
            AgentRole::ResearchManager => "research_manager",
            AgentRole::Trader => "trader",
            AgentRole::RiskManager => "risk_manager",
        }
    }

    /// Judging roles run on the deep-think model.
    pub fn is_judge(&self) -> bool {
        matches!(self, AgentRole::ResearchManager | AgentRole::RiskManager)
    }

    pub fn system_prompt(&self) -> String {
        match self {
            AgentRole::MarketAnalyst => analyst_prompt(
                "market",
                "price action and technical indicators (moving averages, MACD, RSI, \
                 Bollinger bands, ATR, volume)",
            ),
            AgentRole::SocialAnalyst => analyst_prompt(
                "social media and sentiment",
                "public sentiment, social media discussion and company-specific chatter \
                 over the past week",
            ),
            AgentRole::NewsAnalyst => analyst_prompt(
                "news",
                "recent news and macroeconomic developments relevant to trading",
            ),
            AgentRole::FundamentalsAnalyst => analyst_prompt(
                "fundamentals",
                "financial statements, company profile, insider sentiment and insider \
                 transactions",
            ),
            AgentRole::BullResearcher => researcher_prompt("Bull", "investing in"),
            AgentRole::BearResearcher => researcher_prompt("Bear", "against investing in"),
            AgentRole::ResearchManager => format!(
                "You are the research manager and debate facilitator.\n\n\
                 ## TASK\n\n\
                 Critically evaluate the bull and bear arguments in `state.investment_debate_state` \
                 and commit to BUY, SELL or HOLD. Choose HOLD only when the arguments \
                 genuinely balance.\n\n\
                 Then write an investment plan for the trader: your recommendation, the \
                 rationale, and concrete strategic actions.\n\n{}",
                input_format()
            ),
            AgentRole::Trader => format!(
                "You are a trading agent. Based on the analysts' reports and the \
                 research manager's `investment_plan`, produce a concrete trade plan.\n\n\
                 ## OUTPUT\n\n\
                 End your response with `FINAL TRANSACTION PROPOSAL: **BUY/HOLD/SELL**`.\n\n{}",
                input_format()
            ),
            AgentRole::RiskManager => format!(
                "You are the risk management judge. Weigh the trader's plan in \
                 `state.trader_investment_plan` against its downside risks and produce the \
                 final decision.\n\n\
                 ## OUTPUT\n\n\
                 Respond ONLY with a JSON object:\n{}\n\n{}",
                decision_schema(),
                input_format()
            ),
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of the JSON input every agent receives.
fn input_format() -> String {
    "## INPUT FORMAT\n\n\
     The user message is a JSON object:\n\
     - `company` → ticker or company name under analysis\n\
     - `trade_date` → as-of date (YYYY-MM-DD); ignore information after it\n\
     - `conversation` → prior turns with the user, oldest first\n\
     - `state` → reports and debate history produced so far by other agents"
        .to_string()
}

fn decision_schema() -> String {
    let example = serde_json::json!({
        "decision": "BUY | SELL | HOLD",
        "reasoning": "<concise justification referencing the reports>",
    });
    serde_json::to_string_pretty(&example).unwrap_or_default()
}

fn analyst_prompt(area: &str, focus: &str) -> String {
    format!(
        "You are a {area} analyst on a trading research team.\n\n\
         ## TASK\n\n\
         Write a detailed report on {focus} for the company in the input. Do not simply \
         state that trends are mixed; give fine-grained insight that helps traders decide. \
         Finish with a Markdown table summarizing the key points.\n\n{}",
        input_format()
    )
}

fn researcher_prompt(side: &str, stance: &str) -> String {
    format!(
        "You are the {side} Analyst, arguing {stance} the stock.\n\n\
         ## TASK\n\n\
         Build an evidence-based case from the analysts' reports in `state`. Address the \
         opposing analyst's latest argument in `state.investment_debate_state` directly \
         and debate conversationally rather than listing facts.\n\n{}",
        input_format()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        for role in AgentRole::ALL {
            assert_eq!(AgentRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(AgentRole::parse("astrologer"), None);
    }

    #[test]
    fn judges_are_managers() {
        let judges: Vec<_> = AgentRole::ALL.into_iter().filter(|r| r.is_judge()).collect();
        assert_eq!(
            judges,
            vec![AgentRole::ResearchManager, AgentRole::RiskManager]
        );
    }

    #[test]
    fn every_prompt_describes_input() {
        for role in AgentRole::ALL {
            let prompt = role.system_prompt();
            assert!(prompt.contains("INPUT FORMAT"), "Missing INPUT FORMAT in {role}");
            assert!(prompt.contains("trade_date"), "Missing trade_date in {role}");
        }
    }

    #[test]
    fn risk_manager_prompt_requests_json_decision() {
        let prompt = AgentRole::RiskManager.system_prompt();
        assert!(prompt.contains("\"decision\""));
        assert!(prompt.contains("BUY | SELL | HOLD"));
    }

    #[test]
    fn trader_prompt_requests_final_proposal() {
        assert!(AgentRole::Trader
            .system_prompt()
            .contains("FINAL TRANSACTION PROPOSAL"));
    }
}
