//! Domain registry.
//!
//! Each domain carries a display name, a description, and the three
//! role-specific system prompts the pipeline uses. The generator prompt is
//! hand-written per domain; the verifier and synthesizer prompts are derived
//! from the domain description.

/// One query domain and its role-specific system prompts.
#[derive(Debug, Clone)]
pub struct DomainConfig {
    pub key: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub generator_prompt: String,
    pub verifier_prompt: String,
    pub synthesizer_prompt: String,
}

impl DomainConfig {
    fn new(key: &str, name: &str, description: &str, icon: &str, generator_prompt: &str) -> Self {
        let lowered = description.to_lowercase();
        Self {
            key: key.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            generator_prompt: generator_prompt.to_string(),
            verifier_prompt: format!(
                "You are a factual assistant specialized in {lowered}. Answer the following \
                 user query based ONLY on the provided search results context. Do not use any \
                 of your internal knowledge. If the context does not contain the answer, state \
                 that you cannot answer based on the information provided."
            ),
            synthesizer_prompt: format!(
                "You are a meticulous fact-checking and synthesis agent specialized in \
                 {lowered}. Your goal is to produce the most accurate and reliable answer to \
                 the user's query by comparing two different AI-generated answers."
            ),
        }
    }
}

/// The built-in set of domains. Unknown keys resolve to "general".
#[derive(Debug, Clone)]
pub struct DomainRegistry {
    domains: Vec<DomainConfig>,
}

impl DomainRegistry {
    pub fn builtin() -> Self {
        let domains = vec![
            DomainConfig::new(
                "general",
                "General Assistant",
                "General-purpose AI assistant for any topic",
                "brain",
                "You are a helpful AI assistant. Please answer the following query to the \
                 best of your ability.",
            ),
            DomainConfig::new(
                "medical",
                "Medical Assistant",
                "Healthcare and medical information specialist",
                "heart",
                "You are a medical information assistant. Provide accurate, helpful health \
                 information while always emphasizing that you are not a substitute for \
                 professional medical advice, diagnosis, or treatment. Always recommend \
                 consulting healthcare professionals for medical concerns. Focus on general \
                 health education, wellness tips, and reliable medical information.",
            ),
            DomainConfig::new(
                "legal",
                "Legal Assistant",
                "Legal research and general legal information",
                "scale",
                "You are a legal information assistant. Provide general legal information \
                 and explanations of legal concepts. Always clarify that you are not a \
                 lawyer and cannot provide legal advice, represent clients, or substitute \
                 for professional legal counsel. Recommend consulting qualified attorneys \
                 for specific legal situations.",
            ),
            DomainConfig::new(
                "financial",
                "Financial Advisor",
                "Financial planning and investment guidance",
                "dollar-sign",
                "You are a financial information assistant. Provide general financial \
                 education and information about investing, personal finance, and economic \
                 concepts. Always emphasize that you are not a licensed financial advisor \
                 and cannot provide personalized financial advice. Recommend consulting \
                 certified financial professionals for investment decisions.",
            ),
            DomainConfig::new(
                "educational",
                "Educational Tutor",
                "Learning assistant for academic subjects",
                "graduation-cap",
                "You are an educational tutor and learning assistant. Help students \
                 understand academic concepts, explain difficult topics, and provide study \
                 guidance. Focus on making complex subjects accessible and encouraging \
                 critical thinking. Adapt your explanations to different learning styles \
                 and levels.",
            ),
            DomainConfig::new(
                "technical",
                "Technical Assistant",
                "Programming and technical support",
                "code",
                "You are a technical assistant specializing in programming, software \
                 development, and technical problem-solving. Provide code examples, \
                 debugging help, best practices, and technical explanations. Focus on \
                 practical solutions while explaining the reasoning behind technical \
                 decisions.",
            ),
        ];
        Self { domains }
    }

    /// Resolve a domain by key, falling back to "general" for unknown keys.
    pub fn get(&self, key: &str) -> &DomainConfig {
        self.domains
            .iter()
            .find(|d| d.key == key)
            .unwrap_or(&self.domains[0])
    }

    pub fn list(&self) -> &[DomainConfig] {
        &self.domains
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_six_domains() {
        let registry = DomainRegistry::builtin();
        let keys: Vec<&str> = registry.list().iter().map(|d| d.key.as_str()).collect();
        assert_eq!(
            keys,
            ["general", "medical", "legal", "financial", "educational", "technical"]
        );
    }

    #[test]
    fn test_unknown_key_falls_back_to_general() {
        let registry = DomainRegistry::builtin();
        assert_eq!(registry.get("astrology").key, "general");
        assert_eq!(registry.get("medical").key, "medical");
    }

    #[test]
    fn test_derived_prompts_use_lowercased_description() {
        let registry = DomainRegistry::builtin();
        let medical = registry.get("medical");
        assert!(
            medical
                .verifier_prompt
                .starts_with("You are a factual assistant specialized in healthcare and medical")
        );
        assert!(medical.synthesizer_prompt.contains("specialized in healthcare"));
        assert!(medical.verifier_prompt.contains("based ONLY on the provided search results"));
    }
}
