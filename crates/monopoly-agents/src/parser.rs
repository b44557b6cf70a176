//! Action Parser
//!
//! Turns free-form agent text into typed decisions. Every decoder is total:
//! anything it cannot read resolves to the conservative default (pass,
//! reject, wait) instead of an error, so a confused agent can never stall
//! the game.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::Property;

static IMPROVE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"IMPROVE:[ \t]*([^\n]*)"));

static IMPROVE_ENTRY: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"IMPROVE:[ \t]*([^,|\n]+)"));

static TRADE_PROPOSE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile(r"TRADE_PROPOSE:[ \t]*([^:\n]+?)[ \t]*:([^:\n]*):([^:\n]*):[ \t]*\$?([+-]?\d+)")
});

static TRADE_COUNTER: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"^TRADE_COUNTER:([^:\n]*):([^:\n]*):[ \t]*\$?([+-]?\d+)"));

static TRADE_MARKER: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"TRADE_(ACCEPT|REJECT|COUNTER)"));

/// `A)` / `(B)` / `**A.**` / `B:` at the start of a line
static SECTION: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?mi)^[ \t*#>-]*\(?([AB])[ \t]*[).:]"));

const BOILERPLATE: [&str; 6] = [
    "my decision is:",
    "i choose:",
    "i will:",
    "decision:",
    "action:",
    "response:",
];

/// A pattern that fails to compile matches nothing
fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern)
        .inspect_err(|e| tracing::error!(pattern, error = %e, "Invalid parser pattern"))
        .ok()
}

/// How a jailed player wants to get out
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JailChoice {
    UseCard,
    PayFine,
    Wait,
}

impl std::fmt::Display for JailChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::UseCard => "USE_GOOJF",
            Self::PayFine => "PAY_FINE",
            Self::Wait => "WAIT",
        })
    }
}

/// Give/receive/cash fragment, from the point of view of whoever wrote it.
/// `cash > 0`: the writer pays.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeTerms {
    pub give: Vec<String>,
    pub receive: Vec<String>,
    pub cash: i64,
}

impl TradeTerms {
    /// First name that appears on both sides, compared case-insensitively
    pub fn overlap(&self) -> Option<&str> {
        self.give
            .iter()
            .find(|g| self.receive.iter().any(|r| r.eq_ignore_ascii_case(g)))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.give.is_empty() && self.receive.is_empty() && self.cash == 0
    }
}

impl std::fmt::Display for TradeTerms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", csv(&self.give), csv(&self.receive), self.cash)
    }
}

fn csv(names: &[String]) -> String {
    if names.is_empty() {
        "NONE".into()
    } else {
        names.join(",")
    }
}

/// `TRADE_PROPOSE` as written by the agent; names are not yet resolved
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub target: String,
    pub terms: TradeTerms,
}

/// Anything an agent can answer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Buy,
    Pass,
    Improve(String),
    NoImprovement,
    Jail(JailChoice),
    TradeAccept,
    TradeReject,
    TradeCounter(TradeTerms),
    Unclear,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => f.write_str("BUY"),
            Self::Pass => f.write_str("PASS"),
            Self::Improve(name) => write!(f, "IMPROVE:{name}"),
            Self::NoImprovement => f.write_str("NO_IMPROVEMENT"),
            Self::Jail(choice) => write!(f, "{choice}"),
            Self::TradeAccept => f.write_str("TRADE_ACCEPT"),
            Self::TradeReject => f.write_str("TRADE_REJECT"),
            Self::TradeCounter(terms) => write!(f, "TRADE_COUNTER:{terms}"),
            Self::Unclear => f.write_str("UNCLEAR"),
        }
    }
}

/// Decoded batched-strategy reply
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchedStrategy {
    /// Section A
    pub trade_proposal: Option<ProposalDraft>,

    /// Section B, in the order written
    pub improvements: Vec<String>,
}

/// Anything with a display name an agent might refer to
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for Property {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for &Property {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for String {
    fn name(&self) -> &str {
        self
    }
}

impl Named for &str {
    fn name(&self) -> &str {
        self
    }
}

fn head(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

/// BUY unless negated. A reply without BUY (PASS, DECLINE, a bare leading
/// NO, anything unreadable) means pass; an explicit BUY outranks a leading NO.
pub fn parse_buy(text: &str) -> bool {
    let upper = text.trim().to_uppercase();
    upper.contains("BUY")
        && !upper.contains("DON'T BUY")
        && !upper.contains("DONT BUY")
        && !upper.contains("NOT BUY")
}

/// Candidate the agent asked to build on, if any.
///
/// Order: explicit refusal, then `IMPROVE:<name>` matched as a substring of
/// a candidate, then any candidate's full name in the text, then its name
/// without the leading cell code ("BOARDWALK" for "H2 Boardwalk").
pub fn parse_improve<'a, T: Named>(text: &str, candidates: &'a [T]) -> Option<&'a T> {
    let upper = text.trim().to_uppercase();

    if ["NO_IMPROVEMENT", "NO IMPROVEMENT", "PASS", "SKIP"]
        .iter()
        .any(|k| upper.contains(k))
    {
        return None;
    }

    if let Some(wanted) = IMPROVE
        .as_ref()
        .and_then(|re| re.captures(&upper))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|w| !w.is_empty())
    {
        if let Some(hit) = candidates
            .iter()
            .find(|c| c.name().to_uppercase().contains(wanted))
        {
            return Some(hit);
        }
    }

    candidates.iter().find(|c| {
        let name = c.name().to_uppercase();
        if upper.contains(&name) {
            return true;
        }
        let parts: Vec<&str> = name.split_whitespace().collect();
        parts.len() >= 2 && upper.contains(&parts[1..].join(" "))
    })
}

/// Use card beats paying the fine beats waiting; waiting is the default
pub fn parse_jail(text: &str) -> JailChoice {
    let upper = text.trim().to_uppercase();

    if ["USE_GOOJF", "USE GOOJF", "USE CARD"].iter().any(|k| upper.contains(k)) {
        JailChoice::UseCard
    } else if upper.contains("PAY_FINE") || upper.contains("PAY FINE") || head(&upper, 20).contains("PAY") {
        JailChoice::PayFine
    } else {
        JailChoice::Wait
    }
}

/// Legacy yes/no trade answer; only an explicit ACCEPT accepts
pub fn parse_trade_decision(text: &str) -> bool {
    text.to_uppercase().contains("ACCEPT")
}

/// `TRADE_PROPOSE:<target>:<give>:<receive>:<cash>`, unless `NO_TRADE`
pub fn parse_trade_proposal(text: &str) -> Option<ProposalDraft> {
    let upper = text.to_uppercase();
    if upper.contains("NO_TRADE") {
        return None;
    }

    let caps = TRADE_PROPOSE.as_ref()?.captures(&upper)?;
    let target = caps.get(1)?.as_str().trim();
    if target.is_empty() {
        return None;
    }

    Some(ProposalDraft {
        target: target.to_string(),
        terms: TradeTerms {
            give: split_names(caps.get(2)?.as_str()),
            receive: split_names(caps.get(3)?.as_str()),
            cash: caps.get(4)?.as_str().parse().ok()?,
        },
    })
}

/// Accept, reject, counter, or unclear; never anything else.
///
/// The first `TRADE_*` marker in the reply decides. Without one, a reply
/// leading with ACCEPT or REJECT counts. A counter whose terms do not parse
/// is unclear.
pub fn parse_negotiation_response(text: &str) -> Decision {
    let upper = text.to_uppercase();

    if let Some(marker) = TRADE_MARKER.as_ref().and_then(|re| re.find(&upper)) {
        return match marker.as_str() {
            "TRADE_ACCEPT" => Decision::TradeAccept,
            "TRADE_REJECT" => Decision::TradeReject,
            _ => parse_counter(&upper[marker.start()..]).map_or(Decision::Unclear, Decision::TradeCounter),
        };
    }

    let lead = clean(text).to_uppercase();
    if lead.starts_with("ACCEPT") {
        Decision::TradeAccept
    } else if lead.starts_with("REJECT") {
        Decision::TradeReject
    } else {
        Decision::Unclear
    }
}

fn parse_counter(text: &str) -> Option<TradeTerms> {
    let caps = TRADE_COUNTER.as_ref()?.captures(text)?;
    Some(TradeTerms {
        give: split_names(caps.get(1)?.as_str()),
        receive: split_names(caps.get(2)?.as_str()),
        cash: caps.get(3)?.as_str().parse().ok()?,
    })
}

/// Section A is a trade proposal, section B a list of `IMPROVE:` entries.
/// A missing section decodes to its empty default.
pub fn parse_batched_strategy(text: &str) -> BatchedStrategy {
    let mut a: Option<Marker> = None;
    let mut b: Option<Marker> = None;
    for caps in SECTION.iter().flat_map(|re| re.captures_iter(text)) {
        let (Some(whole), Some(letter)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let slot = if letter.as_str().eq_ignore_ascii_case("A") { &mut a } else { &mut b };
        if slot.is_none() {
            *slot = Some((whole.start(), whole.end()));
        }
    }

    let trade_proposal = section(text, a, b).and_then(parse_trade_proposal);
    let improvements = match (section(text, b, a), IMPROVE_ENTRY.as_ref()) {
        (Some(body), Some(re)) => re
            .captures_iter(&body.to_uppercase())
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    BatchedStrategy {
        trade_proposal,
        improvements,
    }
}

/// Start and end offsets of a section marker
type Marker = (usize, usize);

/// Text after `own`, up to `other` if that comes later
fn section(text: &str, own: Option<Marker>, other: Option<Marker>) -> Option<&str> {
    let (_, body) = own?;
    let end = other
        .map(|(start, _)| start)
        .filter(|start| *start > body)
        .unwrap_or(text.len());
    text.get(body..end)
}

/// Drop a boilerplate lead-in ("Decision:", "I choose:") and keep the
/// first non-empty line
pub fn clean(text: &str) -> String {
    let mut rest = text.trim();
    for prefix in BOILERPLATE {
        if rest
            .get(..prefix.len())
            .is_some_and(|lead| lead.eq_ignore_ascii_case(prefix))
        {
            rest = rest[prefix.len()..].trim();
            break;
        }
    }

    rest.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or(rest)
        .to_string()
}

/// Comma-separated names; blanks and `NONE` are dropped
fn split_names(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty() && !name.eq_ignore_ascii_case("NONE"))
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_compile() {
        for pattern in [&IMPROVE, &IMPROVE_ENTRY, &TRADE_PROPOSE, &TRADE_COUNTER, &TRADE_MARKER, &SECTION] {
            assert!(pattern.is_some());
        }
    }

    #[test]
    fn test_parse_buy() {
        assert!(parse_buy("BUY"));
        assert!(parse_buy("  I will buy it  "));
        // A leading NO only passes when BUY is absent; an explicit BUY wins.
        assert!(parse_buy("No, buy"));
        assert!(!parse_buy("No."));
        assert!(!parse_buy("DON'T BUY"));
        assert!(!parse_buy("dont buy this"));
        assert!(!parse_buy("I would not buy that"));
        assert!(!parse_buy("PASS"));
        assert!(!parse_buy("Decline"));
        assert!(!parse_buy("no thanks"));
        assert!(!parse_buy(""));
        assert!(!parse_buy("🤷 maybe"));
    }

    #[test]
    fn test_parse_improve_by_short_name() {
        let candidates = ["A1 Mediterranean", "H2 Boardwalk"];
        assert_eq!(parse_improve("IMPROVE: BOARDWALK", &candidates), Some(&"H2 Boardwalk"));
        assert_eq!(parse_improve("improve:h2", &candidates), Some(&"H2 Boardwalk"));
        assert_eq!(parse_improve("Let's go with Mediterranean", &candidates), Some(&"A1 Mediterranean"));
        assert_eq!(parse_improve("h2 boardwalk", &candidates), Some(&"H2 Boardwalk"));
    }

    #[test]
    fn test_parse_improve_refusals() {
        let candidates = ["H2 Boardwalk".to_string()];
        assert!(parse_improve("NO_IMPROVEMENT", &candidates).is_none());
        assert!(parse_improve("no improvement, boardwalk later", &candidates).is_none());
        assert!(parse_improve("SKIP", &candidates).is_none());
        assert!(parse_improve("IMPROVE:", &candidates).is_none());
        assert!(parse_improve("IMPROVE: Park Place", &candidates).is_none());
        assert!(parse_improve("IMPROVE: BOARDWALK", &[] as &[String]).is_none());
    }

    #[test]
    fn test_parse_jail() {
        assert_eq!(parse_jail("USE_GOOJF"), JailChoice::UseCard);
        assert_eq!(parse_jail("I'll use card"), JailChoice::UseCard);
        assert_eq!(parse_jail("PAY_FINE"), JailChoice::PayFine);
        assert_eq!(parse_jail("pay it"), JailChoice::PayFine);
        assert_eq!(parse_jail("WAIT"), JailChoice::Wait);
        assert_eq!(parse_jail("roll for doubles"), JailChoice::Wait);
        assert_eq!(parse_jail("hmm"), JailChoice::Wait);
    }

    #[test]
    fn test_parse_trade_decision() {
        assert!(parse_trade_decision("I accept"));
        assert!(!parse_trade_decision("REJECT"));
        assert!(!parse_trade_decision("not sure"));
    }

    #[test]
    fn test_parse_trade_proposal_scenario() {
        let draft = parse_trade_proposal("TRADE_PROPOSE:BOB:PARK PLACE:BOARDWALK:200").unwrap();
        assert_eq!(draft.target, "BOB");
        assert_eq!(draft.terms.give, vec!["PARK PLACE"]);
        assert_eq!(draft.terms.receive, vec!["BOARDWALK"]);
        assert_eq!(draft.terms.cash, 200);
    }

    #[test]
    fn test_parse_trade_proposal_variants() {
        let draft = parse_trade_proposal("Sure. trade_propose: Carol : NONE : A1 Mediterranean, A2 Baltic : $-50").unwrap();
        assert_eq!(draft.target, "CAROL");
        assert!(draft.terms.give.is_empty());
        assert_eq!(draft.terms.receive, vec!["A1 MEDITERRANEAN", "A2 BALTIC"]);
        assert_eq!(draft.terms.cash, -50);

        let cash_only = parse_trade_proposal("TRADE_PROPOSE:BOB::BOARDWALK:0").unwrap();
        assert!(cash_only.terms.give.is_empty());

        assert!(parse_trade_proposal("NO_TRADE").is_none());
        assert!(parse_trade_proposal("TRADE_PROPOSE:BOB:PARK PLACE:BOARDWALK:200 ... actually NO_TRADE").is_none());
        assert!(parse_trade_proposal("TRADE_PROPOSE:BOB:PARK PLACE").is_none());
        assert!(parse_trade_proposal("TRADE_PROPOSE:BOB:X:Y:lots").is_none());
        assert!(parse_trade_proposal("TRADE_PROPOSE:BOB:X:Y:99999999999999999999").is_none());
    }

    #[test]
    fn test_parse_negotiation_response() {
        assert_eq!(parse_negotiation_response("TRADE_ACCEPT"), Decision::TradeAccept);
        assert_eq!(parse_negotiation_response("Accept, deal!"), Decision::TradeAccept);
        assert_eq!(parse_negotiation_response("Decision: reject"), Decision::TradeReject);
        assert_eq!(parse_negotiation_response("trade_reject please"), Decision::TradeReject);
        assert_eq!(
            parse_negotiation_response("TRADE_COUNTER:BOARDWALK:PARK PLACE:-100"),
            Decision::TradeCounter(TradeTerms {
                give: vec!["BOARDWALK".into()],
                receive: vec!["PARK PLACE".into()],
                cash: -100,
            })
        );
        assert_eq!(parse_negotiation_response("TRADE_COUNTER:oops"), Decision::Unclear);
        assert_eq!(parse_negotiation_response("I'd rather not"), Decision::Unclear);
    }

    #[test]
    fn test_parse_negotiation_response_is_total() {
        let inputs = [
            "",
            "   ",
            "\n\n",
            ":::",
            "TRADE_",
            "TRADE_COUNTER:",
            "TRADE_COUNTER::::",
            "TRADE_COUNTER:a:b:-",
            "ACCEPTREJECT",
            "ünïcödé TRADE_ACCEPT",
            "decision:",
            "$$$$ -- 9999999999999999999999",
        ];
        for input in inputs {
            let decision = parse_negotiation_response(input);
            assert!(matches!(
                decision,
                Decision::TradeAccept | Decision::TradeReject | Decision::TradeCounter(_) | Decision::Unclear
            ));
        }
    }

    #[test]
    fn test_first_marker_wins() {
        assert_eq!(
            parse_negotiation_response("TRADE_REJECT. Maybe TRADE_ACCEPT next time"),
            Decision::TradeReject
        );
    }

    #[test]
    fn test_parse_batched_strategy() {
        let text = "A) TRADE_PROPOSE:Bob:Park Place:Boardwalk:200\nB) IMPROVE:A1 Mediterranean, IMPROVE: A2 Baltic";
        let plan = parse_batched_strategy(text);
        let draft = plan.trade_proposal.unwrap();
        assert_eq!(draft.target, "BOB");
        assert_eq!(plan.improvements, vec!["A1 MEDITERRANEAN", "A2 BALTIC"]);

        let lenient = parse_batched_strategy("**(A)** NO_TRADE\n**(B)** NO_IMPROVEMENT");
        assert_eq!(lenient, BatchedStrategy::default());

        let b_only = parse_batched_strategy("Here you go\nB: IMPROVE:H2 Boardwalk");
        assert!(b_only.trade_proposal.is_none());
        assert_eq!(b_only.improvements, vec!["H2 BOARDWALK"]);

        assert_eq!(parse_batched_strategy("TRADE_PROPOSE:BOB:X:Y:1"), BatchedStrategy::default());
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean("Decision: BUY\nbecause it's cheap"), "BUY");
        assert_eq!(clean("  My decision is:   PASS"), "PASS");
        assert_eq!(clean("\n\nIMPROVE:H2 Boardwalk\n"), "IMPROVE:H2 Boardwalk");
        assert_eq!(clean("response:"), "");
        assert_eq!(clean("äction: keep"), "äction: keep");
    }
}
