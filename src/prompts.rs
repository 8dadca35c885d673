use crate::types::{
    ActionFinderInput, FIND_ACTION_MAX_CHARS, MAX_CLICKABLE_ELEMENTS, PROCESS_PAGE_MAX_CHARS,
    PageContent, SUMMARY_POINTS, truncate_chars,
};

pub fn process_page_prompt(page: &PageContent) -> String {
    let text = truncate_chars(&page.text_content, PROCESS_PAGE_MAX_CHARS);
    format!(
        r#"You are an assistive reading assistant.

GOAL 1: Create a "Clean View" version of the text. Remove ads, navigation, and fluff. Keep the core meaning but simplify complex sentences.
GOAL 2: Create a "TL;DR" summary with EXACTLY {n} bullet points. Each point should be concise (1-2 sentences max).

IMPORTANT: You MUST return exactly {n} summary points in the summary_points array. No more, no less.

INPUT TEXT:
{text}
"#,
        n = SUMMARY_POINTS,
    )
}

/// Comma-separated labels of the first clickable elements, if any were sent.
pub fn clickable_context(elements: Option<&[String]>) -> Option<String> {
    let elements = elements?;
    if elements.is_empty() {
        return None;
    }
    Some(
        elements
            .iter()
            .take(MAX_CLICKABLE_ELEMENTS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", "),
    )
}

pub fn find_action_prompt(input: &ActionFinderInput) -> String {
    let text = truncate_chars(&input.text_content, FIND_ACTION_MAX_CHARS);
    let mut prompt = format!(
        r#"You are a UX assistant helping a user who struggles with cluttered web pages.

Look at the purpose of this page and name the SINGLE most important action the user would want to take here (for example "Sign in", "Add to cart", "Apply now"). Use the exact visible label of that action when you can. Then briefly explain why this is the main action.

PAGE URL: {url}

PAGE TEXT:
{text}
"#,
        url = input.url,
    );

    if let Some(context) = clickable_context(input.clickable_elements.as_deref()) {
        prompt.push_str(&format!("\nCLICKABLE ELEMENTS ON THE PAGE: {}\n", context));
    }

    prompt
}

pub fn filter_actions_prompt(labels: &[String]) -> String {
    let listing = labels
        .iter()
        .enumerate()
        .map(|(i, label)| format!("{}: {:?}", i, label))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are filtering the clickable elements of a web page for a simplified accessibility view.

Classify every label below as USEFUL or NOISE.

USEFUL:
- Navigation: "Home", "Menu", "Search", "Back", "Next page"
- Functional actions: "Submit", "Login", "Sign up", "Add to cart", "Checkout"
- Content interaction: "Read more", "Play", "Download", "Show comments"
- User actions: "Settings", "Profile", "Logout", "Contact us"

NOISE:
- Ads: "AdChoices", "Sponsored", "Advertisement", "Promoted"
- Social share spam: "Share on Facebook", "Tweet", "Pin it", "Share via email"
- Footer and legal clutter: "Privacy Policy", "Terms of Service", "Cookie settings", "Copyright"
- Tracking: "Do not sell my info", "Manage preferences", "Accept all cookies"
- Empty or duplicate text: "", " ", a label repeated from an earlier entry

LABELS (index: label):
{listing}

Return a single JSON object with the key "valid_indices": an array of the 0-based indices of the USEFUL labels, referring to the numbering above.
"#
    )
}
