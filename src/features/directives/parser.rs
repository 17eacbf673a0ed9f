//! # Prompt Directive Parser
//!
//! Extracts inline `--flag` directives from a free-form prompt. Flags are
//! matched in a fixed order per vocabulary and stripped from the text; the
//! residual prompt is trimmed.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use thiserror::Error;

use crate::features::image_gen::options::{ImageQuality, ImageStyle, Orientation};

/// Which provider's flags are recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vocabulary {
    /// `--natural --vivid --sd --hd --horizontal --vertical`
    Dalle,
    /// `--natural --vivid --horizontal --vertical --ratio X --negative X --seed X`
    Stability,
}

/// Parameters overridden by directives found in a prompt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptDirectives {
    pub style: Option<ImageStyle>,
    pub quality: Option<ImageQuality>,
    pub orientation: Option<Orientation>,
    pub ratio: Option<String>,
    pub seed: Option<u64>,
    pub negative_prompt: Option<String>,
}

impl PromptDirectives {
    pub fn is_empty(&self) -> bool {
        *self == PromptDirectives::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPrompt {
    /// Prompt text with every recognized directive removed, trimmed
    pub prompt: String,
    pub directives: PromptDirectives,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveError {
    #[error("The {0} option needs a value, for example: {0} <value>.")]
    MissingArgument(&'static str),
    #[error("Seed must be a whole number, got '{0}'.")]
    InvalidSeed(String),
}

/// Parse directives out of `raw` using the given vocabulary.
///
/// Em-dashes are normalized to `--` first so that auto-corrected input
/// still matches. Argument flags (`--ratio`, `--negative`, `--seed`) take
/// exactly one whitespace-delimited word; multi-word values are not
/// supported.
pub fn parse(raw: &str, vocabulary: Vocabulary) -> Result<ParsedPrompt, DirectiveError> {
    let mut prompt = raw.replace('—', "--");
    let mut directives = PromptDirectives::default();

    if take_flag(&mut prompt, "--natural") {
        directives.style = Some(ImageStyle::Natural);
    }
    if take_flag(&mut prompt, "--vivid") {
        directives.style = Some(ImageStyle::Vivid);
    }

    match vocabulary {
        Vocabulary::Dalle => {
            if take_flag(&mut prompt, "--sd") {
                directives.quality = Some(ImageQuality::Standard);
            }
            if take_flag(&mut prompt, "--hd") {
                directives.quality = Some(ImageQuality::Hd);
            }
            take_orientation(&mut prompt, &mut directives);
        }
        Vocabulary::Stability => {
            prompt = prompt.replace("  ", " ");
            take_orientation(&mut prompt, &mut directives);

            if let Some(ratio) = take_argument(&mut prompt, "--ratio")? {
                directives.ratio = Some(ratio);
            }
            if let Some(negative) = take_argument(&mut prompt, "--negative")? {
                directives.negative_prompt = Some(negative);
            }
            if let Some(seed) = take_argument(&mut prompt, "--seed")? {
                let parsed = seed
                    .parse::<u64>()
                    .map_err(|_| DirectiveError::InvalidSeed(seed.clone()))?;
                directives.seed = Some(parsed);
            }
        }
    }

    Ok(ParsedPrompt {
        prompt: prompt.trim().to_string(),
        directives,
    })
}

fn take_orientation(prompt: &mut String, directives: &mut PromptDirectives) {
    if take_flag(prompt, "--horizontal") {
        directives.orientation = Some(Orientation::Landscape);
    }
    if take_flag(prompt, "--vertical") {
        directives.orientation = Some(Orientation::Portrait);
    }
}

/// Remove every occurrence of `flag`; returns whether it was present
fn take_flag(prompt: &mut String, flag: &str) -> bool {
    if !prompt.contains(flag) {
        return false;
    }
    *prompt = prompt.replace(flag, "");
    true
}

/// Remove the first `flag <value>` pair, then any repeats of that exact
/// pair, and return the value.
///
/// The value is the first word between the flag and its next occurrence.
fn take_argument(
    prompt: &mut String,
    flag: &'static str,
) -> Result<Option<String>, DirectiveError> {
    let Some(pos) = prompt.find(flag) else {
        return Ok(None);
    };

    let start = pos + flag.len();
    let segment_end = prompt[start..]
        .find(flag)
        .map(|i| start + i)
        .unwrap_or(prompt.len());
    let segment = &prompt[start..segment_end];
    let leading = segment.len() - segment.trim_start().len();

    let value = match segment.split_whitespace().next() {
        Some(value) => value.to_string(),
        None => return Err(DirectiveError::MissingArgument(flag)),
    };

    let value_end = start + leading + value.len();
    prompt.replace_range(pos..value_end, "");
    *prompt = prompt.replace(&format!("{flag} {value}"), "");
    Ok(Some(value))
}
