//! Disability profile catalog.
//!
//! One entry per [`DisabilityProfile`], holding the directive sent to the
//! generator and a short description for listings. Adding a profile means
//! adding a variant and an entry here; nothing else branches on profiles.

use serde::Serialize;

use accesscms_shared::DisabilityProfile;

/// A catalog entry.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProfileEntry {
    pub profile: DisabilityProfile,
    pub description: &'static str,
    #[serde(skip)]
    pub directive: &'static str,
}

/// The catalog, index-aligned with [`DisabilityProfile::ALL`].
pub static CATALOG: [ProfileEntry; DisabilityProfile::ALL.len()] = [
    ProfileEntry {
        profile: DisabilityProfile::WheelchairUser,
        description: "Content adapted for wheelchair users with focus on mobility accessibility",
        directive: "\
Adapt this content for wheelchair users by:
1. Prioritize accessibility features like ramps, elevators, door widths, accessible bathrooms
2. Highlight mobility-related amenities and services
3. Emphasize accessibility information for transportation and movement
4. Focus on barrier-free access details
5. Maintain all original information but reorganize with accessibility features first
Return the same JSON structure with reordered and enhanced content for wheelchair accessibility.",
    },
    ProfileEntry {
        profile: DisabilityProfile::Dyslexia,
        description: "Content simplified for people with dyslexia using clear language",
        directive: "\
Adapt this content for people with dyslexia by:
1. Use simple, clear language with shorter sentences
2. Avoid complex words - replace with simpler alternatives
3. Use consistent terminology throughout
4. Structure information with clear headings and bullet points
5. Provide explanations for technical terms
6. Use lowercase where appropriate if specified in user preferences
Return the same JSON structure maintaining all information but with dyslexia-friendly language.",
    },
    ProfileEntry {
        profile: DisabilityProfile::CognitiveImpairment,
        description: "Content simplified for cognitive accessibility",
        directive: "\
Adapt this content for people with cognitive impairments by:
1. Use very simple, clear language
2. Break complex information into smaller, digestible chunks
3. Use concrete, specific details rather than abstract concepts
4. Provide step-by-step information where relevant
5. Emphasize support services and assistance available
6. Highlight emergency contacts and help resources prominently
Return the same JSON structure with simplified, concrete language and clear structure.",
    },
    ProfileEntry {
        profile: DisabilityProfile::AnxietyTravelFear,
        description: "Content adapted to reduce travel anxiety with detailed information",
        directive: "\
Adapt this content for people with travel anxiety by:
1. Emphasize safety features and security measures
2. Provide detailed, predictable information to reduce uncertainty
3. Highlight cancellation policies and flexibility options
4. Emphasize support services and staff availability
5. Include calming, reassuring language
6. Provide clear contact information for questions and support
Return the same JSON structure with reassuring, detailed information that reduces travel anxiety.",
    },
    ProfileEntry {
        profile: DisabilityProfile::LowVision,
        description: "Content enhanced with descriptive details for low vision users",
        directive: "\
Adapt this content for people with low vision by:
1. Emphasize audio descriptions and tactile features
2. Highlight high-contrast visual elements and lighting
3. Focus on descriptive details about layouts and navigation
4. Emphasize braille availability and audio guides
5. Provide detailed verbal descriptions of visual elements
6. Highlight staff assistance for visual navigation
Return the same JSON structure with enhanced descriptive content for low vision needs.",
    },
];

/// Catalog entry for a profile.
pub fn entry(profile: DisabilityProfile) -> &'static ProfileEntry {
    &CATALOG[profile.index()]
}

/// Adaptation directive for a profile.
pub fn directive_for(profile: DisabilityProfile) -> &'static str {
    entry(profile).directive
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_aligned_with_profiles() {
        assert_eq!(CATALOG.len(), DisabilityProfile::ALL.len());
        for (entry, profile) in CATALOG.iter().zip(DisabilityProfile::ALL) {
            assert_eq!(entry.profile, profile);
        }
    }

    #[test]
    fn every_directive_demands_same_structure() {
        for profile in DisabilityProfile::ALL {
            let directive = directive_for(profile);
            assert!(!directive.is_empty());
            assert!(directive.contains("Return the same JSON structure"));
        }
    }

    #[test]
    fn directives_match_their_audience() {
        assert!(directive_for(DisabilityProfile::WheelchairUser).contains("ramps"));
        assert!(directive_for(DisabilityProfile::Dyslexia).contains("shorter sentences"));
        assert!(directive_for(DisabilityProfile::CognitiveImpairment).contains("emergency contacts"));
        assert!(directive_for(DisabilityProfile::AnxietyTravelFear).contains("cancellation policies"));
        assert!(directive_for(DisabilityProfile::LowVision).contains("braille"));
    }

    #[test]
    fn entry_serializes_without_directive() {
        let json = serde_json::to_value(entry(DisabilityProfile::LowVision)).unwrap();
        assert_eq!(json["profile"], "low_vision");
        assert!(json.get("directive").is_none());
        assert!(json["description"].as_str().unwrap().contains("low vision"));
    }
}
