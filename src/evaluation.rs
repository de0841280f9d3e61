use crate::filter::{FilterOutcome, filter_candidates};
use crate::models::{
    Answers, CostData, EvalResultRow, EvaluationOutput, ModelOption, PaymentPreference,
    PerfDimension, PlanMatch, PricingSegment, SegmentLabel,
};
use crate::stats::{mean, median, percentile_ranks};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Weight of a matching payment plan on top of the base score
pub const PLAN_BONUS_WEIGHT: f64 = 0.05;

/// Score used when there is nothing to rank on
const NEUTRAL_SCORE: f64 = 0.5;

const SEGMENT_NOTE: &str = "Segmente werden als Drittel der durchschnittlichen Tokenkosten (50/50 Input/Output) innerhalb der aktuellen Kandidatenmenge berechnet (Proxy-Daten).";

/// Filter the catalog and rank the surviving candidates.
///
/// An empty result list is a regular outcome meaning no option matches the
/// answers; the audit log is still returned.
pub fn evaluate(models: &[ModelOption], answers: &Answers) -> EvaluationOutput {
    let FilterOutcome {
        candidates,
        log,
        excluded_by_stage,
        ..
    } = filter_candidates(models, answers);

    if candidates.is_empty() {
        return EvaluationOutput {
            results: Vec::new(),
            log,
            excluded_by_stage,
            diagnostics: BTreeMap::new(),
        };
    }

    let scorer = Scorer::new(&candidates, answers);
    let mut results: Vec<EvalResultRow> = candidates.iter().map(|m| scorer.score(m)).collect();
    results.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));

    let diagnostics = scorer.diagnostics(&results);

    EvaluationOutput {
        results,
        log,
        excluded_by_stage,
        diagnostics,
    }
}

/// Targets in cost-position space; no selection prefers the cheapest
fn cost_targets(segments: &BTreeSet<PricingSegment>) -> Vec<f64> {
    if segments.is_empty() {
        return vec![1.0];
    }
    segments.iter().map(|s| s.target_position()).collect()
}

/// Ranking tables computed once over the candidate set
struct Scorer<'a> {
    answers: &'a Answers,
    cost_weight: f64,
    cost_targets: Vec<f64>,
    cost_scores: HashMap<&'a str, f64>,
    perf_ranks: BTreeMap<PerfDimension, HashMap<&'a str, f64>>,
    segments: HashMap<&'a str, SegmentLabel>,
}

impl<'a> Scorer<'a> {
    fn new(candidates: &[&'a ModelOption], answers: &'a Answers) -> Self {
        let costs: Vec<(&'a str, f64)> = candidates
            .iter()
            .filter_map(|&m| m.avg_token_cost().map(|c| (m.model_id.as_str(), c)))
            .collect();
        let cost_targets = cost_targets(&answers.pricing_segments);

        Self {
            answers,
            cost_weight: answers.cost_importance.weight(),
            cost_scores: Self::cost_scores(&costs, &cost_targets),
            cost_targets,
            perf_ranks: Self::perf_ranks(candidates),
            segments: Self::segment_labels(&costs),
        }
    }

    /// Closeness of each priced candidate's cost position to the nearest target
    fn cost_scores(costs: &[(&'a str, f64)], targets: &[f64]) -> HashMap<&'a str, f64> {
        percentile_ranks(costs)
            .into_iter()
            .map(|(id, pct)| {
                let position = 1.0 - pct;
                let best = targets
                    .iter()
                    .map(|t| 1.0 - (position - t).abs())
                    .fold(0.0, f64::max);
                (id, best.clamp(0.0, 1.0))
            })
            .collect()
    }

    fn perf_ranks(candidates: &[&'a ModelOption]) -> BTreeMap<PerfDimension, HashMap<&'a str, f64>> {
        PerfDimension::ALL
            .into_iter()
            .map(|dim| {
                let values: Vec<(&'a str, f64)> = candidates
                    .iter()
                    .filter_map(|&m| m.perf_value(dim).map(|v| (m.model_id.as_str(), v)))
                    .collect();
                (dim, percentile_ranks(&values))
            })
            .collect()
    }

    /// Thirds by ascending average cost; needs at least three priced candidates
    fn segment_labels(costs: &[(&'a str, f64)]) -> HashMap<&'a str, SegmentLabel> {
        let n = costs.len();
        if n < 3 {
            return HashMap::new();
        }
        let mut sorted = costs.to_vec();
        sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

        let lower_end = n / 3;
        let middle_end = 2 * n / 3;
        let mut labels = HashMap::with_capacity(n);
        for (idx, (id, _)) in sorted.into_iter().enumerate() {
            let label = if idx < lower_end {
                SegmentLabel::Lower
            } else if idx < middle_end {
                SegmentLabel::Middle
            } else {
                SegmentLabel::Upper
            };
            labels.entry(id).or_insert(label);
        }
        labels
    }

    fn plan_fit(&self, model: &ModelOption) -> (f64, PlanMatch) {
        let supported = match self.answers.payment_plan_preference {
            None => return (0.0, PlanMatch::NoPreference),
            Some(PaymentPreference::UsageBased) => model.usage_based_pricing_available,
            Some(PaymentPreference::Subscription) => model.subscription_available,
        };
        if supported == Some(true) {
            (1.0, PlanMatch::Matches)
        } else {
            (0.0, PlanMatch::Mismatch)
        }
    }

    fn score(&self, model: &ModelOption) -> EvalResultRow {
        let id = model.model_id.as_str();
        let avg_token_cost = model.avg_token_cost();
        let cost_score = match avg_token_cost {
            Some(_) => self.cost_scores.get(id).copied().unwrap_or(NEUTRAL_SCORE),
            None => NEUTRAL_SCORE,
        };

        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        if self.cost_weight > 0.0 {
            weighted += self.cost_weight * cost_score;
            total_weight += self.cost_weight;
        }

        let mut dims_used = 0;
        for dim in PerfDimension::ALL {
            let weight = self.answers.perf_importance(dim).weight();
            if weight == 0.0 {
                continue;
            }
            let Some(rank) = self.perf_ranks.get(&dim).and_then(|r| r.get(id)) else {
                continue;
            };
            weighted += weight * rank;
            total_weight += weight;
            dims_used += 1;
        }

        let base_score = if total_weight == 0.0 {
            NEUTRAL_SCORE
        } else {
            weighted / total_weight
        };
        let (plan_bonus, plan_match) = self.plan_fit(model);

        EvalResultRow {
            model_id: model.model_id.clone(),
            model_name: model.model_name.clone(),
            developer_name: model.developer_name.clone(),
            country_of_origin: model.country_of_origin.clone(),
            source_type: model.source_type,
            final_score: base_score + PLAN_BONUS_WEIGHT * plan_bonus,
            base_score,
            avg_token_cost,
            input_token_price: model.input_token_price,
            output_token_price: model.output_token_price,
            cost_score,
            cost_data: if avg_token_cost.is_some() {
                CostData::Ok
            } else {
                CostData::NotAvailable
            },
            perf_dims_used: format!("{}/{}", dims_used, PerfDimension::ALL.len()),
            plan_bonus,
            plan_match,
            segment_label: match avg_token_cost {
                Some(_) => self
                    .segments
                    .get(id)
                    .copied()
                    .unwrap_or(SegmentLabel::NotAvailable),
                None => SegmentLabel::NotAvailable,
            },
            perf_values: PerfDimension::ALL
                .into_iter()
                .map(|dim| (dim, model.perf_value(dim)))
                .collect(),
        }
    }

    fn diagnostics(&self, results: &[EvalResultRow]) -> BTreeMap<String, serde_json::Value> {
        let finals: Vec<f64> = results.iter().map(|r| r.final_score).collect();

        let mut diagnostics = BTreeMap::new();
        diagnostics.insert("note".to_string(), json!(SEGMENT_NOTE));
        diagnostics.insert("candidate_count".to_string(), json!(results.len()));
        diagnostics.insert("cost_weight".to_string(), json!(self.cost_weight));
        diagnostics.insert("cost_targets".to_string(), json!(self.cost_targets));
        diagnostics.insert("mean_final_score".to_string(), json!(mean(&finals)));
        diagnostics.insert("median_final_score".to_string(), json!(median(&finals)));
        diagnostics
    }
}
