use serde::Serialize;
use url::form_urlencoded;

use super::format::dollars;
use super::types::{CalculatorResult, Inputs, Mode};

pub const FROM_MARKER: &str = "calculator";

pub const KEY_FROM: &str = "from";
pub const KEY_TOTAL_GAP: &str = "total_gap";
pub const KEY_GARBAGE_COST: &str = "garbage_cost";
pub const KEY_MISSED_COST: &str = "missed_cost";
pub const KEY_MODE: &str = "mode";
pub const KEY_LEADS: &str = "leads";
pub const KEY_JOB_VALUE: &str = "job_value";
pub const KEY_CLOSE_RATE: &str = "close_rate";
pub const KEY_MISSED_CALLS: &str = "missed_calls";

pub const DEFAULT_HERO_SUBHEAD: &str = "Watch AI capture leads you're currently losing.";
pub const DEFAULT_FINAL_CTA: &str = "Ready to stop the bleeding?";

pub fn encode(result: &CalculatorResult, inputs: &Inputs, mode: Mode) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair(KEY_FROM, FROM_MARKER)
        .append_pair(KEY_TOTAL_GAP, &result.total.monthly.to_string())
        .append_pair(KEY_GARBAGE_COST, &result.garbage.total.to_string())
        .append_pair(KEY_MISSED_COST, &result.missed.total.to_string())
        .append_pair(KEY_MODE, mode.as_str())
        .append_pair(KEY_LEADS, &inputs.monthly_leads().to_string())
        .append_pair(KEY_JOB_VALUE, &inputs.avg_job_value().to_string())
        .append_pair(KEY_CLOSE_RATE, &inputs.close_rate().to_string())
        .append_pair(KEY_MISSED_CALLS, &inputs.missed_calls().to_string())
        .finish()
}

pub fn handoff_link(base_path: &str, result: &CalculatorResult, inputs: &Inputs, mode: Mode) -> String {
    format!("{base_path}?{}", encode(result, inputs, mode))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffContext {
    pub from_calculator: bool,
    pub total_gap: Option<u64>,
    pub garbage_cost: Option<u64>,
    pub missed_cost: Option<u64>,
    pub mode: Option<Mode>,
    pub leads: Option<u32>,
    pub job_value: Option<u32>,
    pub close_rate: Option<u32>,
    pub missed_calls: Option<u32>,
}

/// Accepts a full link, a bare query or a query with a leading `?`.
/// First occurrence of a repeated key wins.
pub fn decode(query: &str) -> HandoffContext {
    let query = query.split_once('?').map_or(query, |(_, q)| q);
    let mut from = None;
    let mut ctx = HandoffContext::default();

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            KEY_FROM => {
                from.get_or_insert_with(|| value == FROM_MARKER);
            }
            KEY_TOTAL_GAP => fill(&mut ctx.total_gap, &value),
            KEY_GARBAGE_COST => fill(&mut ctx.garbage_cost, &value),
            KEY_MISSED_COST => fill(&mut ctx.missed_cost, &value),
            KEY_MODE => {
                if ctx.mode.is_none() {
                    ctx.mode = value.parse().ok();
                }
            }
            KEY_LEADS => fill(&mut ctx.leads, &value),
            KEY_JOB_VALUE => fill(&mut ctx.job_value, &value),
            KEY_CLOSE_RATE => fill(&mut ctx.close_rate, &value),
            KEY_MISSED_CALLS => fill(&mut ctx.missed_calls, &value),
            _ => {}
        }
    }

    ctx.from_calculator = from.unwrap_or(false);
    ctx
}

fn fill<T: std::str::FromStr>(slot: &mut Option<T>, raw: &str) {
    if slot.is_none() {
        *slot = raw.trim().parse().ok();
    }
}

impl HandoffContext {
    /// Garbage leak dominates. Ties and missing numbers give no emphasis.
    pub fn highlight_garbage(&self) -> bool {
        matches!((self.garbage_cost, self.missed_cost), (Some(g), Some(m)) if g > m)
    }

    pub fn highlight_missed(&self) -> bool {
        matches!((self.garbage_cost, self.missed_cost), (Some(g), Some(m)) if m > g)
    }

    fn personal_gap(&self) -> Option<u64> {
        if self.from_calculator {
            self.total_gap
        } else {
            None
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    AiQualification,
    AlwaysOnAnswering,
    SmartInsights,
}

impl Feature {
    pub const ALL: [Feature; 3] = [
        Feature::AiQualification,
        Feature::AlwaysOnAnswering,
        Feature::SmartInsights,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Feature::AiQualification => "AI Qualification",
            Feature::AlwaysOnAnswering => "24/7 Answering",
            Feature::SmartInsights => "Smart Insights",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureCard {
    pub feature: Feature,
    pub title: &'static str,
    pub highlight: bool,
}

/// Copy and emphasis choices for the experience page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Personalization {
    pub show_calculator_banner: bool,
    pub hero_subhead: String,
    pub final_cta_headline: String,
    pub highlight_garbage: bool,
    pub highlight_missed: bool,
    pub features: Vec<FeatureCard>,
}

impl Personalization {
    pub fn from_context(ctx: &HandoffContext) -> Self {
        let highlight_garbage = ctx.highlight_garbage();
        let highlight_missed = ctx.highlight_missed();

        let (hero_subhead, final_cta_headline) = match ctx.personal_gap() {
            Some(gap) => (
                format!("You're losing {}/month. Here's how we fix it.", dollars(gap)),
                format!("Stop losing {}/month", dollars(gap)),
            ),
            None => (DEFAULT_HERO_SUBHEAD.to_string(), DEFAULT_FINAL_CTA.to_string()),
        };

        let features = Feature::ALL
            .into_iter()
            .map(|feature| FeatureCard {
                feature,
                title: feature.title(),
                highlight: match feature {
                    Feature::AiQualification => highlight_garbage,
                    Feature::AlwaysOnAnswering => highlight_missed,
                    Feature::SmartInsights => false,
                },
            })
            .collect();

        Self {
            show_calculator_banner: !ctx.from_calculator,
            hero_subhead,
            final_cta_headline,
            highlight_garbage,
            highlight_missed,
            features,
        }
    }
}
