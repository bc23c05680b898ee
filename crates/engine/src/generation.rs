use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use nutricoach_core::{
    ActionType, ConversationAction, ConversationContextCompact, DayPart, ResponseTone, Sentiment,
    TurnError, UiHints, UserIntent,
};

/// Draft produced by a generation orchestrator before gating. Candidate
/// actions are exactly that: candidates. Nothing here reaches the user
/// without passing the permission gate.
#[derive(Clone, Debug, PartialEq)]
pub struct DraftResponse {
    pub message: String,
    pub diagnosis: Option<String>,
    pub short_term_plan: Vec<String>,
    pub candidate_actions: Vec<ConversationAction>,
    pub ui: Option<UiHints>,
}

/// Boundary to the generation orchestrator. The engine never holds more
/// than a compact context reference on the far side of this trait; the
/// allowed action set is the only vocabulary the orchestrator may draw from.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(
        &self,
        context: &ConversationContextCompact,
        allowed_actions: &[ActionType],
    ) -> Result<DraftResponse>;
}

/// Deterministic template-based generator. Serves quota-blocked turns, the
/// rules generation mode, and every fallback after an orchestrator failure.
#[derive(Clone, Debug, Default)]
pub struct RulesGenerator;

impl RulesGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous drafting used directly on fallback paths.
    pub fn draft(
        &self,
        context: &ConversationContextCompact,
        allowed_actions: &[ActionType],
    ) -> DraftResponse {
        let signal = &context.signal;
        let mut plan = Vec::new();
        let mut wanted_actions: Vec<(ActionType, &str)> = Vec::new();
        let mut diagnosis = None;
        let mut tone = ResponseTone::Informative;

        let message = match signal.primary_intent {
            UserIntent::Hunger => {
                diagnosis = Some("Faim signalée en dehors d'un repas planifié.".to_string());
                wanted_actions.push((ActionType::SuggestMeal, "Voir une idée de repas"));
                wanted_actions.push((ActionType::LogMeal, "Noter ce que je mange"));
                if signal.day_part == DayPart::Evening || signal.day_part == DayPart::Night {
                    plan.push("Prévois une source de protéines au dîner.".to_string());
                    plan.push("Bois un grand verre d'eau avant de grignoter.".to_string());
                    "La faim du soir est souvent amplifiée par une journée trop légère ou le \
                     stress. Prends un vrai repas plutôt que de grignoter, avec des protéines \
                     pour tenir jusqu'au coucher."
                } else {
                    plan.push("Ajoute une collation riche en fibres.".to_string());
                    "Si la faim revient entre les repas, vérifie que ton dernier repas était \
                     assez complet. Une collation protéinée peut t'aider à tenir."
                }
            }
            UserIntent::Craving => {
                wanted_actions.push((ActionType::SuggestMeal, "Une alternative gourmande"));
                wanted_actions.push((ActionType::LogMeal, "Noter cette envie"));
                plan.push("Attends dix minutes avant de céder à l'envie.".to_string());
                "Une fringale ciblée est rarement de la vraie faim. Note-la, bois quelque \
                 chose, et si l'envie persiste choisis une portion raisonnable plutôt que \
                 l'interdit total."
            }
            UserIntent::Stress => {
                tone = ResponseTone::Supportive;
                wanted_actions
                    .push((ActionType::StartBreathingExercise, "Respirer deux minutes"));
                plan.push("Fais une pause de deux minutes de respiration profonde.".to_string());
                "Le stress pousse souvent vers le grignotage. Avant de manger, accorde-toi \
                 une courte pause de respiration : elle fait retomber l'envie dans la \
                 plupart des cas."
            }
            UserIntent::Sleep => {
                wanted_actions.push((ActionType::ScheduleReminder, "Rappel coucher"));
                plan.push("Vise une heure de coucher régulière cette semaine.".to_string());
                "Le sommeil pèse directement sur la faim du lendemain : une nuit courte \
                 augmente l'appétit. Essaie de stabiliser ton heure de coucher."
            }
            UserIntent::Energy => {
                plan.push("Vérifie ton apport en protéines au déjeuner.".to_string());
                "Un coup de fatigue peut venir d'un repas trop léger ou d'une nuit courte. \
                 Regarde d'abord ton déjeuner et ton sommeil avant de forcer sur le café."
            }
            UserIntent::PlanAdjustment => {
                wanted_actions.push((ActionType::AdjustCalories, "Ajuster mes calories"));
                plan.push("Confirme l'ajustement proposé avant application.".to_string());
                "On peut ajuster ton objectif calorique. Vérifie la proposition ci-dessous : \
                 rien n'est appliqué sans ta confirmation."
            }
            UserIntent::ProgressCheck => {
                tone = ResponseTone::Celebratory;
                wanted_actions.push((ActionType::ShowProgress, "Voir mon bilan"));
                "Voici où tu en es. Regarde ton bilan : la tendance compte plus que le \
                 chiffre d'un jour isolé."
            }
            UserIntent::MealIdea => {
                wanted_actions.push((ActionType::SuggestMeal, "Voir la suggestion"));
                "Je te propose une idée adaptée à ton objectif et à ce que tu as déjà mangé \
                 aujourd'hui."
            }
            UserIntent::NutritionQuestion => {
                wanted_actions.push((ActionType::OpenEducationCard, "En savoir plus"));
                "Bonne question. Voici l'essentiel, et une fiche détaillée si tu veux \
                 creuser."
            }
            UserIntent::Motivation | UserIntent::EmotionalDistress => {
                tone = ResponseTone::Supportive;
                plan.push("Fixe-toi un seul objectif simple pour demain.".to_string());
                "Les passages à vide font partie du parcours. Un petit pas suffit pour \
                 relancer la machine : choisis une seule chose simple à réussir demain."
            }
            UserIntent::Greeting => {
                wanted_actions.push((ActionType::ShowProgress, "Voir ma journée"));
                return DraftResponse {
                    message: "Bonjour ! Comment puis-je t'aider aujourd'hui ?".to_string(),
                    diagnosis: None,
                    short_term_plan: Vec::new(),
                    candidate_actions: filter_allowed(wanted_actions, allowed_actions),
                    ui: Some(UiHints {
                        tone: ResponseTone::Supportive,
                        quick_replies: vec![
                            "J'ai faim".to_string(),
                            "Une idée de repas ?".to_string(),
                            "Mon bilan".to_string(),
                        ],
                    }),
                };
            }
            UserIntent::Unknown => {
                "Je ne suis pas sûr d'avoir compris. Tu peux me parler de ta faim, de ton \
                 stress, de tes repas ou de tes progrès."
            }
        }
        .to_string();

        if signal.sentiment == Sentiment::Negative && tone == ResponseTone::Informative {
            tone = ResponseTone::Supportive;
        }

        DraftResponse {
            message,
            diagnosis,
            short_term_plan: plan,
            candidate_actions: filter_allowed(wanted_actions, allowed_actions),
            ui: Some(UiHints { tone, quick_replies: Vec::new() }),
        }
    }
}

fn filter_allowed(
    wanted: Vec<(ActionType, &str)>,
    allowed_actions: &[ActionType],
) -> Vec<ConversationAction> {
    wanted
        .into_iter()
        .filter(|(action_type, _)| allowed_actions.contains(action_type))
        .map(|(action_type, label)| ConversationAction::new(action_type, label))
        .collect()
}

#[async_trait]
impl ResponseGenerator for RulesGenerator {
    async fn generate(
        &self,
        context: &ConversationContextCompact,
        allowed_actions: &[ActionType],
    ) -> Result<DraftResponse> {
        Ok(self.draft(context, allowed_actions))
    }
}

#[async_trait]
impl<G> ResponseGenerator for std::sync::Arc<G>
where
    G: ResponseGenerator + ?Sized,
{
    async fn generate(
        &self,
        context: &ConversationContextCompact,
        allowed_actions: &[ActionType],
    ) -> Result<DraftResponse> {
        (**self).generate(context, allowed_actions).await
    }
}

/// Wraps an orchestrator with a hard deadline. Overrun is a generation
/// failure, never a hang: callers fall back to the rules path.
pub struct DeadlineGenerator<G> {
    inner: G,
    deadline: Duration,
}

impl<G> DeadlineGenerator<G> {
    pub fn new(inner: G, deadline: Duration) -> Self {
        Self { inner, deadline }
    }
}

#[async_trait]
impl<G> ResponseGenerator for DeadlineGenerator<G>
where
    G: ResponseGenerator,
{
    async fn generate(
        &self,
        context: &ConversationContextCompact,
        allowed_actions: &[ActionType],
    ) -> Result<DraftResponse> {
        match tokio::time::timeout(self.deadline, self.inner.generate(context, allowed_actions))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(TurnError::GenerationTimeout {
                deadline_ms: self.deadline.as_millis() as u64,
            }
            .into()),
        }
    }
}
