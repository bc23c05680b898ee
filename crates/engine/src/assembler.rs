use std::time::Instant;

use nutricoach_core::{
    ConversationResponse, GenerationPath, ResponseMeta, ResponseTone, SafetyCheckResult,
    SubscriptionTier, UiHints,
};

use crate::gate::GateOutcome;
use crate::generation::DraftResponse;

const QUOTA_MESSAGE_FREE: &str = "Tu as utilisé tous tes messages coach du jour. Ton quota se \
    recharge demain. Avec l'offre Premium, tu peux échanger sans limite.";
const QUOTA_MESSAGE_PREMIUM: &str = "Tu as atteint la limite d'échanges du jour. Ton quota se \
    recharge demain.";

/// Merges validated text, gated actions, disclaimers, and UI hints into the
/// final response. The only place a `ConversationResponse` is built: every
/// action it carries went through the gate, or the action list is empty.
#[derive(Clone, Debug, Default)]
pub struct ResponseAssembler;

impl ResponseAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble(
        &self,
        draft: DraftResponse,
        gated: GateOutcome,
        safety: &SafetyCheckResult,
        path: GenerationPath,
        started: Instant,
        degraded: bool,
    ) -> ConversationResponse {
        ConversationResponse {
            message: draft.message,
            diagnosis: draft.diagnosis,
            short_term_plan: draft.short_term_plan,
            actions: gated.allowed,
            ui: draft.ui,
            disclaimer: safety.disclaimer.clone(),
            meta: ResponseMeta::new(path, elapsed_ms(started), degraded),
        }
    }

    /// Minimal terminal response for a policy refusal: the fixed redirect
    /// text and nothing else.
    pub fn assemble_refusal(
        &self,
        safety: &SafetyCheckResult,
        started: Instant,
    ) -> ConversationResponse {
        let message = safety
            .redirect_message
            .clone()
            .unwrap_or_else(|| crate::safety::REDIRECT_MESSAGE.to_string());

        ConversationResponse {
            message,
            diagnosis: None,
            short_term_plan: Vec::new(),
            actions: Vec::new(),
            ui: Some(UiHints { tone: ResponseTone::Alert, quick_replies: Vec::new() }),
            disclaimer: None,
            meta: ResponseMeta::new(GenerationPath::Rules, elapsed_ms(started), false),
        }
    }

    /// Minimal terminal response when the daily message budget is spent.
    pub fn assemble_quota_notice(
        &self,
        tier: SubscriptionTier,
        started: Instant,
    ) -> ConversationResponse {
        let message = match tier {
            SubscriptionTier::Free => QUOTA_MESSAGE_FREE,
            SubscriptionTier::Premium => QUOTA_MESSAGE_PREMIUM,
        };

        ConversationResponse {
            message: message.to_string(),
            diagnosis: None,
            short_term_plan: Vec::new(),
            actions: Vec::new(),
            ui: Some(UiHints { tone: ResponseTone::Informative, quick_replies: Vec::new() }),
            disclaimer: None,
            meta: ResponseMeta::new(GenerationPath::Rules, elapsed_ms(started), false),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use nutricoach_core::{
        ActionType, ConversationAction, GenerationPath, SafetyCheckResult, SafetyFlag,
        SubscriptionTier,
    };

    use crate::gate::GateOutcome;
    use crate::generation::DraftResponse;

    use super::ResponseAssembler;

    fn draft() -> DraftResponse {
        DraftResponse {
            message: "Voici une idée adaptée.".to_string(),
            diagnosis: None,
            short_term_plan: vec!["Un pas à la fois.".to_string()],
            candidate_actions: Vec::new(),
            ui: None,
        }
    }

    #[test]
    fn assembled_response_carries_only_gated_actions_and_the_disclaimer() {
        let assembler = ResponseAssembler::new();
        let mut safety = SafetyCheckResult::allow();
        safety.flags = vec![SafetyFlag::DiabetesMention];
        safety.disclaimer = Some("Parles-en à ton médecin.".to_string());

        let gated = GateOutcome {
            allowed: vec![ConversationAction::new(ActionType::SuggestMeal, "Voir")],
            rejected: Vec::new(),
        };

        let response = assembler.assemble(
            draft(),
            gated,
            &safety,
            GenerationPath::Llm,
            Instant::now(),
            false,
        );

        assert_eq!(response.actions.len(), 1);
        assert_eq!(response.disclaimer.as_deref(), Some("Parles-en à ton médecin."));
        assert_eq!(response.meta.path, GenerationPath::Llm);
        assert!(!response.meta.degraded);
        assert!(!response.meta.response_id.is_empty());
    }

    #[test]
    fn refusal_response_has_no_actions_and_uses_the_redirect() {
        let assembler = ResponseAssembler::new();
        let mut safety = SafetyCheckResult::allow();
        safety.redirect_message = Some("Parles-en à un professionnel.".to_string());

        let response = assembler.assemble_refusal(&safety, Instant::now());
        assert!(response.actions.is_empty());
        assert_eq!(response.message, "Parles-en à un professionnel.");
        assert_eq!(response.meta.path, GenerationPath::Rules);
    }

    #[test]
    fn quota_notice_suggests_the_upgrade_only_to_free_users() {
        let assembler = ResponseAssembler::new();

        let free = assembler.assemble_quota_notice(SubscriptionTier::Free, Instant::now());
        assert!(free.message.contains("Premium"));
        assert!(free.actions.is_empty());

        let premium = assembler.assemble_quota_notice(SubscriptionTier::Premium, Instant::now());
        assert!(!premium.message.contains("Premium,"));
    }
}
