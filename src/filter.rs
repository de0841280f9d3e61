use crate::models::{AccessMode, Answers, HostingResponsibility, ModelOption, TrainingPolicy};
use std::collections::{BTreeMap, HashSet};

/// Result of running one stage over the current candidates
pub enum StageOutcome<'a> {
    /// The relevant answer is unset; nothing was screened
    Skipped,
    /// The stage ran with the given selection and kept these candidates
    Screened {
        selection: String,
        kept: Vec<&'a ModelOption>,
    },
}

type StageFn = for<'a> fn(&[&'a ModelOption], &Answers) -> StageOutcome<'a>;

/// One elimination stage of the candidate pipeline
pub struct Stage {
    /// Label used in the audit log
    pub label: &'static str,
    /// Label under which removed models are recorded
    pub removal_label: &'static str,
    pub run: StageFn,
}

pub const TRUST_LABEL: &str = "Ausschlüsse nach Vertrauen";
pub const HOSTING_LABEL: &str = "Betrieb / Bereitstellung möglich";
pub const ACCESS_LABEL: &str = "Zugriffsarten";
pub const COMPLIANCE_LABEL: &str = "Compliance";
pub const EEA_SCREEN_LABEL: &str = "Compliance (EWR-Prüfung)";
pub const OUTPUT_IP_LABEL: &str = "Rechte an Ausgaben";
pub const TRAINING_LABEL: &str = "Training mit Eingaben";

/// The stages in the order they are applied
pub const STAGES: [Stage; 6] = [
    Stage {
        label: TRUST_LABEL,
        removal_label: TRUST_LABEL,
        run: trust_exclusions,
    },
    Stage {
        label: HOSTING_LABEL,
        removal_label: HOSTING_LABEL,
        run: hosting_feasibility,
    },
    Stage {
        label: ACCESS_LABEL,
        removal_label: ACCESS_LABEL,
        run: access_modes,
    },
    Stage {
        label: COMPLIANCE_LABEL,
        removal_label: EEA_SCREEN_LABEL,
        run: compliance,
    },
    Stage {
        label: OUTPUT_IP_LABEL,
        removal_label: OUTPUT_IP_LABEL,
        run: output_ip_contract,
    },
    Stage {
        label: TRAINING_LABEL,
        removal_label: TRAINING_LABEL,
        run: training_contract,
    },
];

/// Candidates left after all stages, with the audit trail
#[derive(Debug, Clone)]
pub struct FilterOutcome<'a> {
    pub candidates: Vec<&'a ModelOption>,
    pub log: Vec<String>,
    pub excluded_by_stage: BTreeMap<String, Vec<String>>,
    pub provider_scope: bool,
}

/// Narrow the catalog through every stage in order
pub fn filter_candidates<'a>(models: &'a [ModelOption], answers: &Answers) -> FilterOutcome<'a> {
    let mut candidates: Vec<&ModelOption> = models.iter().collect();
    let mut log = Vec::with_capacity(STAGES.len());
    let mut excluded_by_stage: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for stage in &STAGES {
        match (stage.run)(&candidates, answers) {
            StageOutcome::Skipped => log.push(format!("{}: übersprungen.", stage.label)),
            StageOutcome::Screened { selection, kept } => {
                let removed = removed_names(&candidates, &kept);
                if !removed.is_empty() {
                    excluded_by_stage
                        .entry(stage.removal_label.to_string())
                        .or_default()
                        .extend(removed);
                }
                log.push(format!(
                    "{}: ausgewählt {}; {} Option(en) entfernt; verbleibend {}.",
                    stage.label,
                    selection,
                    candidates.len() - kept.len(),
                    kept.len()
                ));
                candidates = kept;
            }
        }
    }

    FilterOutcome {
        candidates,
        log,
        excluded_by_stage,
        provider_scope: answers.provider_scope(),
    }
}

/// Sorted names of the models in `before` whose id did not survive
fn removed_names(before: &[&ModelOption], after: &[&ModelOption]) -> Vec<String> {
    let kept_ids: HashSet<&str> = after.iter().map(|m| m.model_id.as_str()).collect();
    let mut names: Vec<String> = before
        .iter()
        .filter(|m| !kept_ids.contains(m.model_id.as_str()))
        .map(|m| m.model_name.clone())
        .collect();
    names.sort();
    names
}

fn retain<'a>(
    candidates: &[&'a ModelOption],
    keep: impl Fn(&ModelOption) -> bool,
) -> Vec<&'a ModelOption> {
    candidates.iter().copied().filter(|m| keep(*m)).collect()
}

fn list_or_none<'s>(values: impl IntoIterator<Item = &'s String>) -> String {
    let joined = values
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        "keine".to_string()
    } else {
        joined
    }
}

fn trust_exclusions<'a>(candidates: &[&'a ModelOption], answers: &Answers) -> StageOutcome<'a> {
    let selection = format!(
        "countries={}; developers={}",
        list_or_none(&answers.exclude_countries),
        list_or_none(&answers.exclude_developers)
    );
    let kept = retain(candidates, |m| {
        !answers.exclude_developers.contains(&m.developer_name)
            && !answers.exclude_countries.contains(&m.country_of_origin)
    });
    StageOutcome::Screened { selection, kept }
}

fn hosting_feasibility<'a>(candidates: &[&'a ModelOption], answers: &Answers) -> StageOutcome<'a> {
    let Some(hosting) = answers.hosting_responsibility else {
        return StageOutcome::Skipped;
    };
    let kept = retain(candidates, |m| match hosting {
        HostingResponsibility::ProviderManaged => m.has_hosts(),
        HostingResponsibility::SelfManaged => m.is_open_weight(),
        HostingResponsibility::Either => m.is_open_weight() || m.has_hosts(),
    });
    StageOutcome::Screened {
        selection: hosting.as_str().to_string(),
        kept,
    }
}

fn access_modes<'a>(candidates: &[&'a ModelOption], answers: &Answers) -> StageOutcome<'a> {
    let required = &answers.required_access_modes;
    if !answers.provider_scope() || required.is_empty() {
        return StageOutcome::Skipped;
    }
    let needs_api = required.contains(&AccessMode::Api);
    let needs_chat = required.contains(&AccessMode::Chat);
    let kept = retain(candidates, |m| {
        let api_ok = !needs_api || m.api_availability == Some(true);
        let chat_ok = !needs_chat || m.hosts.iter().any(|h| h.chat_available == Some(true));
        api_ok && chat_ok
    });
    let selection = required
        .iter()
        .map(|mode| mode.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    StageOutcome::Screened { selection, kept }
}

/// Open-weight models pass; others need at least one EEA-processing host
fn passes_eea_screen(model: &ModelOption) -> bool {
    model.is_open_weight() || model.hosts.iter().any(|h| h.eea_processing == Some(true))
}

fn compliance<'a>(candidates: &[&'a ModelOption], answers: &Answers) -> StageOutcome<'a> {
    if !answers.provider_scope() {
        return StageOutcome::Skipped;
    }
    let Some(personal) = answers.personal_data_input else {
        return StageOutcome::Skipped;
    };

    let selection = if personal {
        "personenbezogene Daten=ja (EWR-Prüfung automatisch)".to_string()
    } else {
        let eea = match answers.eea_required {
            Some(true) => "ja",
            Some(false) => "nein",
            None => "übersprungen",
        };
        format!("personenbezogene Daten=nein; EWR-Anforderung={eea}")
    };

    let screen = personal || answers.eea_required == Some(true);
    let kept = if screen {
        retain(candidates, passes_eea_screen)
    } else {
        candidates.to_vec()
    };
    StageOutcome::Screened { selection, kept }
}

// Open-weight models are exempt even when the record says otherwise.
fn output_ip_contract<'a>(candidates: &[&'a ModelOption], answers: &Answers) -> StageOutcome<'a> {
    match answers.require_output_ip {
        None => StageOutcome::Skipped,
        Some(true) => StageOutcome::Screened {
            selection: "ja".to_string(),
            kept: retain(candidates, |m| m.is_open_weight() || m.output_ip == Some(true)),
        },
        Some(false) => StageOutcome::Screened {
            selection: "nein".to_string(),
            kept: candidates.to_vec(),
        },
    }
}

fn training_contract<'a>(candidates: &[&'a ModelOption], answers: &Answers) -> StageOutcome<'a> {
    match answers.allow_training_on_inputs {
        None => StageOutcome::Skipped,
        Some(false) => StageOutcome::Screened {
            selection: "nein (Training nicht erlaubt)".to_string(),
            kept: retain(candidates, |m| {
                m.is_open_weight()
                    || matches!(
                        m.training_on_user_inputs,
                        Some(TrainingPolicy::NoTrain | TrainingPolicy::OptOut)
                    )
            }),
        },
        Some(true) => StageOutcome::Screened {
            selection: "ja (Training erlaubt)".to_string(),
            kept: candidates.to_vec(),
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Host, SourceType};
    use std::collections::BTreeMap;

    pub(crate) fn model(id: &str, source_type: SourceType) -> ModelOption {
        ModelOption {
            model_id: id.to_string(),
            model_name: format!("Model {id}"),
            developer_name: format!("Dev {id}"),
            country_of_origin: "USA".to_string(),
            source_type,
            output_ip: None,
            training_on_user_inputs: None,
            usage_based_pricing_available: None,
            subscription_available: None,
            api_availability: None,
            hosts: Vec::new(),
            input_token_price: None,
            output_token_price: None,
            perf: BTreeMap::new(),
        }
    }

    pub(crate) fn host(eea: bool, chat: bool) -> Host {
        Host {
            host_name: "Cloud".to_string(),
            host_country: None,
            eea_processing: Some(eea),
            chat_available: Some(chat),
            api_available: Some(true),
        }
    }

    fn catalog() -> Vec<ModelOption> {
        let open_local = model("open-local", SourceType::OpenWeight);

        let mut open_hosted = model("open-hosted", SourceType::OpenWeight);
        open_hosted.country_of_origin = "France".to_string();
        open_hosted.hosts = vec![host(true, true)];
        open_hosted.api_availability = Some(true);

        let mut prop_eu = model("prop-eu", SourceType::Proprietary);
        prop_eu.hosts = vec![host(true, false)];
        prop_eu.api_availability = Some(true);
        prop_eu.output_ip = Some(true);
        prop_eu.training_on_user_inputs = Some(TrainingPolicy::NoTrain);

        let mut prop_us = model("prop-us", SourceType::Proprietary);
        prop_us.country_of_origin = "China".to_string();
        prop_us.hosts = vec![host(false, true)];
        prop_us.output_ip = Some(false);
        prop_us.training_on_user_inputs = Some(TrainingPolicy::YesTrain);

        let mut prop_unhosted = model("prop-unhosted", SourceType::Proprietary);
        prop_unhosted.training_on_user_inputs = Some(TrainingPolicy::OptOut);

        vec![open_local, open_hosted, prop_eu, prop_us, prop_unhosted]
    }

    fn ids(outcome: &FilterOutcome<'_>) -> Vec<String> {
        outcome.candidates.iter().map(|m| m.model_id.clone()).collect()
    }

    #[test]
    fn test_empty_catalog_logs_every_stage() {
        let outcome = filter_candidates(&[], &Answers::default());
        assert!(outcome.candidates.is_empty());
        assert!(outcome.excluded_by_stage.is_empty());
        assert_eq!(outcome.log.len(), STAGES.len());
        assert_eq!(
            outcome.log[0],
            "Ausschlüsse nach Vertrauen: ausgewählt countries=keine; developers=keine; 0 Option(en) entfernt; verbleibend 0."
        );
        assert_eq!(outcome.log[1], "Betrieb / Bereitstellung möglich: übersprungen.");
    }

    #[test]
    fn test_default_answers_keep_everything() {
        let models = catalog();
        let outcome = filter_candidates(&models, &Answers::default());
        assert_eq!(outcome.candidates.len(), models.len());
        assert!(outcome.provider_scope);
        for (entry, stage) in outcome.log.iter().zip(STAGES.iter()).skip(1) {
            assert_eq!(entry, &format!("{}: übersprungen.", stage.label));
        }
    }

    #[test]
    fn test_trust_exclusions() {
        let models = catalog();
        let mut answers = Answers::default();
        answers.exclude_countries.insert("China".to_string());
        answers.exclude_developers.insert("Dev open-local".to_string());

        let outcome = filter_candidates(&models, &answers);
        assert_eq!(ids(&outcome), vec!["open-hosted", "prop-eu", "prop-unhosted"]);
        assert_eq!(
            outcome.excluded_by_stage[TRUST_LABEL],
            vec!["Model open-local", "Model prop-us"]
        );
        assert_eq!(
            outcome.log[0],
            "Ausschlüsse nach Vertrauen: ausgewählt countries=China; developers=Dev open-local; 2 Option(en) entfernt; verbleibend 3."
        );
    }

    #[test]
    fn test_hosting_provider_managed() {
        let models = catalog();
        let answers = Answers {
            hosting_responsibility: Some(HostingResponsibility::ProviderManaged),
            ..Answers::default()
        };
        let outcome = filter_candidates(&models, &answers);
        assert_eq!(ids(&outcome), vec!["open-hosted", "prop-eu", "prop-us"]);
        assert!(outcome.provider_scope);
    }

    #[test]
    fn test_hosting_self_managed_skips_provider_stages() {
        let models = catalog();
        let mut answers = Answers {
            hosting_responsibility: Some(HostingResponsibility::SelfManaged),
            personal_data_input: Some(true),
            ..Answers::default()
        };
        answers.required_access_modes.insert(AccessMode::Chat);

        let outcome = filter_candidates(&models, &answers);
        assert_eq!(ids(&outcome), vec!["open-local", "open-hosted"]);
        assert!(!outcome.provider_scope);
        assert_eq!(outcome.log[2], "Zugriffsarten: übersprungen.");
        assert_eq!(outcome.log[3], "Compliance: übersprungen.");
    }

    #[test]
    fn test_hosting_either() {
        let models = catalog();
        let answers = Answers {
            hosting_responsibility: Some(HostingResponsibility::Either),
            ..Answers::default()
        };
        let outcome = filter_candidates(&models, &answers);
        assert_eq!(
            ids(&outcome),
            vec!["open-local", "open-hosted", "prop-eu", "prop-us"]
        );
        assert_eq!(outcome.excluded_by_stage[HOSTING_LABEL], vec!["Model prop-unhosted"]);
    }

    #[test]
    fn test_access_modes_api_and_chat() {
        let models = catalog();
        let mut answers = Answers::default();
        answers.required_access_modes.insert(AccessMode::Api);
        let api_only = filter_candidates(&models, &answers);
        assert_eq!(ids(&api_only), vec!["open-hosted", "prop-eu"]);

        answers.required_access_modes.insert(AccessMode::Chat);
        let both = filter_candidates(&models, &answers);
        assert_eq!(ids(&both), vec!["open-hosted"]);
        assert_eq!(
            both.log[2],
            "Zugriffsarten: ausgewählt API, Chat; 4 Option(en) entfernt; verbleibend 1."
        );
    }

    #[test]
    fn test_compliance_personal_data_applies_eea_screen() {
        let models = catalog();
        let answers = Answers {
            personal_data_input: Some(true),
            ..Answers::default()
        };
        let outcome = filter_candidates(&models, &answers);
        assert_eq!(ids(&outcome), vec!["open-local", "open-hosted", "prop-eu"]);
        assert_eq!(
            outcome.excluded_by_stage[EEA_SCREEN_LABEL],
            vec!["Model prop-unhosted", "Model prop-us"]
        );
        assert!(!outcome.excluded_by_stage.contains_key(COMPLIANCE_LABEL));
        assert!(outcome.log[3].starts_with("Compliance: ausgewählt personenbezogene Daten=ja"));
    }

    #[test]
    fn test_compliance_eea_required_without_personal_data() {
        let models = catalog();
        let answers = Answers {
            personal_data_input: Some(false),
            eea_required: Some(true),
            ..Answers::default()
        };
        let outcome = filter_candidates(&models, &answers);
        assert_eq!(outcome.candidates.len(), 3);
        assert_eq!(
            outcome.log[3],
            "Compliance: ausgewählt personenbezogene Daten=nein; EWR-Anforderung=ja; 2 Option(en) entfernt; verbleibend 3."
        );
    }

    #[test]
    fn test_compliance_recorded_without_screening() {
        let models = catalog();
        let answers = Answers {
            personal_data_input: Some(false),
            ..Answers::default()
        };
        let outcome = filter_candidates(&models, &answers);
        assert_eq!(outcome.candidates.len(), models.len());
        assert_eq!(
            outcome.log[3],
            "Compliance: ausgewählt personenbezogene Daten=nein; EWR-Anforderung=übersprungen; 0 Option(en) entfernt; verbleibend 5."
        );
    }

    #[test]
    fn test_output_ip_required() {
        let models = catalog();
        let answers = Answers {
            require_output_ip: Some(true),
            ..Answers::default()
        };
        let outcome = filter_candidates(&models, &answers);
        assert_eq!(ids(&outcome), vec!["open-local", "open-hosted", "prop-eu"]);

        let relaxed = Answers {
            require_output_ip: Some(false),
            ..Answers::default()
        };
        let outcome = filter_candidates(&models, &relaxed);
        assert_eq!(outcome.candidates.len(), models.len());
        assert_eq!(
            outcome.log[4],
            "Rechte an Ausgaben: ausgewählt nein; 0 Option(en) entfernt; verbleibend 5."
        );
    }

    #[test]
    fn test_training_disallowed() {
        let models = catalog();
        let answers = Answers {
            allow_training_on_inputs: Some(false),
            ..Answers::default()
        };
        let outcome = filter_candidates(&models, &answers);
        assert_eq!(
            ids(&outcome),
            vec!["open-local", "open-hosted", "prop-eu", "prop-unhosted"]
        );
        assert_eq!(outcome.excluded_by_stage[TRAINING_LABEL], vec!["Model prop-us"]);
    }

    #[test]
    fn test_open_weight_exempt_from_contract_stages() {
        // Documented special case: contradictory flags on an open-weight record are ignored.
        let mut contradictory = model("ow", SourceType::OpenWeight);
        contradictory.output_ip = Some(false);
        contradictory.training_on_user_inputs = Some(TrainingPolicy::YesTrain);
        let bare = model("bare", SourceType::OpenWeight);
        let models = vec![contradictory, bare];

        let answers = Answers {
            require_output_ip: Some(true),
            allow_training_on_inputs: Some(false),
            ..Answers::default()
        };
        let outcome = filter_candidates(&models, &answers);
        assert_eq!(ids(&outcome), vec!["ow", "bare"]);
        assert!(outcome.excluded_by_stage.is_empty());
    }

    #[test]
    fn test_stages_only_remove_and_record_each_removal_once() {
        let models = catalog();
        let mut strict = Answers {
            hosting_responsibility: Some(HostingResponsibility::Either),
            personal_data_input: Some(true),
            require_output_ip: Some(true),
            allow_training_on_inputs: Some(false),
            ..Answers::default()
        };
        strict.exclude_countries.insert("France".to_string());
        strict.required_access_modes.insert(AccessMode::Api);

        let answer_sets = [
            Answers::default(),
            strict,
            Answers {
                hosting_responsibility: Some(HostingResponsibility::SelfManaged),
                allow_training_on_inputs: Some(false),
                ..Answers::default()
            },
        ];

        for answers in &answer_sets {
            let mut current: Vec<&ModelOption> = models.iter().collect();
            for stage in &STAGES {
                if let StageOutcome::Screened { kept, .. } = (stage.run)(&current, answers) {
                    assert!(kept.len() <= current.len());
                    assert!(kept.iter().all(|k| current.iter().any(|c| c.model_id == k.model_id)));
                    current = kept;
                }
            }

            let outcome = filter_candidates(&models, answers);
            let final_ids: Vec<&str> = current.iter().map(|m| m.model_id.as_str()).collect();
            assert_eq!(
                outcome.candidates.iter().map(|m| m.model_id.as_str()).collect::<Vec<_>>(),
                final_ids
            );

            let mut recorded: Vec<&String> = outcome.excluded_by_stage.values().flatten().collect();
            recorded.sort();
            let mut expected: Vec<&String> = models
                .iter()
                .filter(|m| !final_ids.contains(&m.model_id.as_str()))
                .map(|m| &m.model_name)
                .collect();
            expected.sort();
            assert_eq!(recorded, expected);
        }
    }
}
