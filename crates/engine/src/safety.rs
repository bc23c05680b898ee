use nutricoach_core::{
    AgeBracket, IntentDetectionResult, SafetyAction, SafetyCheckResult, SafetyFlag, SafetyTier,
    UserInfo,
};
use tracing::debug;

use crate::text::normalize_text;

/// Fixed redirect shown instead of any generated content when a critical
/// flag is raised.
pub const REDIRECT_MESSAGE: &str = "Je ne suis pas en mesure de t'accompagner sur ce sujet. \
    Parles-en à une personne de confiance ou à un professionnel de santé. \
    En France, le 3114 est à ton écoute 24h/24, gratuitement.";

const DISCLAIMER_MINOR: &str = "Ces repères sont donnés à titre indicatif : à ton âge, un suivi \
    par un professionnel de santé est indispensable avant de modifier ton alimentation.";
const DISCLAIMER_PREGNANCY: &str = "Pendant une grossesse, les besoins nutritionnels sont \
    particuliers : valide tout changement avec ton médecin ou ta sage-femme.";
const DISCLAIMER_DIABETES: &str = "Avec un diabète, tout ajustement alimentaire doit être validé \
    avec ton médecin ou ton diabétologue.";
const DISCLAIMER_ALLERGY: &str = "En cas d'allergie alimentaire, vérifie toujours la composition \
    exacte des aliments proposés.";
const DISCLAIMER_MEDICAL: &str = "Je ne remplace pas un avis médical : pour toute question de \
    santé, consulte un professionnel.";

fn detector_lexicon(flag: SafetyFlag) -> &'static [&'static str] {
    match flag {
        SafetyFlag::SelfHarmSignal => &[
            "me faire du mal",
            "me blesser",
            "plus envie de vivre",
            "envie de disparaitre",
            "en finir",
            "suicide",
            "suicidaire",
        ],
        SafetyFlag::ExtremeRestriction => &[
            "ne plus manger",
            "arreter de manger",
            "plus rien manger",
            "sauter tous les repas",
            "jeuner plusieurs jours",
            "moins de 500",
            "me faire vomir",
            "vomir apres",
            "laxatif",
        ],
        // Age statements are handled separately in `detect_minor_mention`.
        SafetyFlag::MinorUser => &["au college", "je suis mineur", "je suis mineure"],
        SafetyFlag::PregnancyMention => &["enceinte", "grossesse", "pregnant"],
        SafetyFlag::DiabetesMention => &["diabete", "diabetique", "glycemie", "insuline"],
        SafetyFlag::AllergyMention => &["allergie", "allergique", "anaphylaxie"],
        SafetyFlag::MedicalAdviceRequest => &[
            "medicament",
            "ordonnance",
            "symptome",
            "traitement",
            "dois-je consulter",
            "mon medecin m'a dit",
            "maladie",
        ],
    }
}

const SCANNED_FLAGS: [SafetyFlag; 7] = [
    SafetyFlag::SelfHarmSignal,
    SafetyFlag::ExtremeRestriction,
    SafetyFlag::MinorUser,
    SafetyFlag::PregnancyMention,
    SafetyFlag::DiabetesMention,
    SafetyFlag::AllergyMention,
    SafetyFlag::MedicalAdviceRequest,
];

/// Runs every flag detector independently over normalized text. A turn may
/// raise several flags at once; the decision policy is the guard's job.
pub fn scan_safety_signals(normalized: &str) -> Vec<SafetyFlag> {
    let mut flags = Vec::new();

    for flag in SCANNED_FLAGS {
        let mut hit = detector_lexicon(flag)
            .iter()
            .any(|pattern| normalized.contains(pattern));
        if flag == SafetyFlag::MinorUser {
            hit = hit || detect_minor_mention(normalized);
        }
        if hit {
            flags.push(flag);
        }
    }

    flags
}

/// Matches stated ages under 18: "j'ai 15 ans", "j ai 12 ans".
fn detect_minor_mention(normalized: &str) -> bool {
    for start in ["j'ai ", "j ai "] {
        let mut rest = normalized;
        while let Some(position) = rest.find(start) {
            let after = &rest[position + start.len()..];
            let digits = after.chars().take_while(|c| c.is_ascii_digit()).collect::<String>();
            if !digits.is_empty() {
                let tail = after[digits.len()..].trim_start();
                if tail.starts_with("ans") {
                    if let Ok(age) = digits.parse::<u8>() {
                        if age < 18 {
                            return true;
                        }
                    }
                }
            }
            rest = &rest[position + start.len()..];
        }
    }
    false
}

/// Decides whether generation may proceed for a turn.
///
/// The policy is a strict precedence table evaluated in fixed order, first
/// match wins; multiple flags never combine into a weaker outcome than the
/// strictest one present.
#[derive(Clone, Debug, Default)]
pub struct SafetyGuard;

impl SafetyGuard {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(
        &self,
        detected: &IntentDetectionResult,
        raw_text: &str,
        user: &UserInfo,
    ) -> SafetyCheckResult {
        let normalized = normalize_text(raw_text);
        let mut flags = scan_safety_signals(&normalized);

        for flag in &detected.safety_flags {
            if !flags.contains(flag) {
                flags.push(*flag);
            }
        }

        // The profile can establish minority without any text mention.
        if user.age_bracket == AgeBracket::Under18 && !flags.contains(&SafetyFlag::MinorUser) {
            flags.push(SafetyFlag::MinorUser);
        }

        flags.sort_by_key(SafetyFlag::rank);

        let result = match flags.iter().map(SafetyFlag::tier).min() {
            Some(SafetyTier::Critical) => SafetyCheckResult {
                is_allowed: false,
                flags,
                action: SafetyAction::RefuseRedirect,
                redirect_message: Some(REDIRECT_MESSAGE.to_string()),
                disclaimer: None,
                block_high_risk_actions: true,
            },
            Some(SafetyTier::Sensitive) => {
                let leading = flags
                    .iter()
                    .copied()
                    .find(|flag| flag.tier() == SafetyTier::Sensitive)
                    .map(disclaimer_for_flag);
                SafetyCheckResult {
                    is_allowed: true,
                    flags,
                    action: SafetyAction::SafeRewrite,
                    redirect_message: None,
                    disclaimer: leading,
                    block_high_risk_actions: true,
                }
            }
            Some(SafetyTier::Advisory) => SafetyCheckResult {
                is_allowed: true,
                flags,
                action: SafetyAction::SafeRewrite,
                redirect_message: None,
                disclaimer: Some(DISCLAIMER_MEDICAL.to_string()),
                block_high_risk_actions: false,
            },
            None => SafetyCheckResult::allow(),
        };

        if !result.flags.is_empty() {
            debug!(
                event_name = "safety.flags_raised",
                action = ?result.action,
                flag_count = result.flags.len(),
                "safety guard raised flags"
            );
        }

        result
    }
}

fn disclaimer_for_flag(flag: SafetyFlag) -> String {
    match flag {
        SafetyFlag::MinorUser => DISCLAIMER_MINOR,
        SafetyFlag::PregnancyMention => DISCLAIMER_PREGNANCY,
        SafetyFlag::DiabetesMention => DISCLAIMER_DIABETES,
        SafetyFlag::AllergyMention => DISCLAIMER_ALLERGY,
        // Critical flags redirect instead; advisory uses the medical text.
        _ => DISCLAIMER_MEDICAL,
    }
    .to_string()
}
