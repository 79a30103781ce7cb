use scrivener_types::models::{ContentType, Length, Tone};

pub fn tone_guideline(tone: Tone) -> &'static str {
    match tone {
        Tone::Professional => "Use professional, formal language.",
        Tone::Casual => "Use casual, friendly language.",
        Tone::Creative => "Be creative and engaging.",
        Tone::Persuasive => "Be persuasive and compelling.",
        Tone::Informative => "Be informative and educational.",
    }
}

pub fn length_guideline(length: Length) -> &'static str {
    match length {
        Length::Short => "Keep it concise, around 50-100 words.",
        Length::Medium => "Make it moderate length, around 150-250 words.",
        Length::Long => "Create detailed content, around 300-500 words.",
    }
}

/// System instructions framing the conversation for a content type.
pub fn system_prompt(content_type: ContentType, tone: Tone, length: Length) -> String {
    let (task, extras, closing): (&str, &[&str], &str) = match content_type {
        ContentType::LinkedinPost => (
            "You write professional LinkedIn posts.",
            &[
                "Include relevant hashtags",
                "Make it engaging and valuable for a LinkedIn audience",
                "Use appropriate formatting with line breaks",
            ],
            "Generate only the post content, no explanations.",
        ),
        ContentType::ProfessionalEmail => (
            "You write professional emails.",
            &[
                "Include an appropriate subject line",
                "Use proper email structure (greeting, body, closing)",
                "Keep the communication clear and concise",
            ],
            "Generate only the email content.",
        ),
        ContentType::AdContent => (
            "You write compelling ad copy.",
            &[
                "Include an attention-grabbing headline",
                "Focus on benefits and a call to action",
            ],
            "Generate only the ad content.",
        ),
        ContentType::ConversationalText => (
            "You write conversational text.",
            &["Use a natural, flowing conversation style", "Keep it engaging and relatable"],
            "Generate only the conversational text.",
        ),
        ContentType::BlogPost => (
            "You write blog posts.",
            &[
                "Include an engaging title",
                "Structure it with an introduction, body and conclusion",
            ],
            "Generate only the blog post.",
        ),
        ContentType::SocialMediaCaption => (
            "You write social media captions.",
            &[
                "Make it engaging and shareable",
                "Include relevant hashtags and emojis",
            ],
            "Generate only the caption.",
        ),
    };

    let mut out = String::with_capacity(512);
    out.push_str(task);
    out.push_str("\n\nRequirements:\n");
    out.push_str("- ");
    out.push_str(tone_guideline(tone));
    out.push_str("\n- ");
    out.push_str(length_guideline(length));
    for extra in extras {
        out.push_str("\n- ");
        out.push_str(extra);
    }
    out.push_str("\n\n");
    out.push_str(closing);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_carries_all_guidelines() {
        let prompt = system_prompt(ContentType::SocialMediaCaption, Tone::Casual, Length::Short);
        assert!(prompt.starts_with("You write social media captions."));
        assert!(prompt.contains(tone_guideline(Tone::Casual)));
        assert!(prompt.contains(length_guideline(Length::Short)));
        assert!(prompt.contains("hashtags and emojis"));
        assert!(prompt.ends_with("Generate only the caption."));
    }

    #[test]
    fn every_content_type_has_a_template() {
        for ct in ContentType::ALL {
            let prompt = system_prompt(ct, Tone::default(), Length::default());
            assert!(prompt.contains("Requirements:"), "{ct} template missing requirements");
        }
    }
}
