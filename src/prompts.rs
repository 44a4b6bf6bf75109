//! Fixed prompt templates for every stage.
//!
//! Provider-agnostic: each builder renders the system instruction plus the
//! user message (with the metadata file attached where the stage needs it)
//! into gateway [`Message`]s.

use crate::gateway::Message;

/// The four rubric questions the judge answers yes/no for each response.
pub const RUBRIC_QUESTIONS: [&str; 4] = [
    "Is the question appropriately answered in a relevant and understandable way without misinterpretation?",
    "Does the response provide relevant measures/dashboards that addresses all parts of the question without ignoring any important available measures/dashboards?",
    "Does the response acknowledge a lack of appropriate data when applicable, rather than hallucinating fake measures?",
    "Is the data source and description accurately described, when applicable?",
];

pub const GENERATION_SYSTEM_PROMPT: &str = "\
Your job is to generate prompts/questions that will be used for evaluation of an LLM.
The goal of that LLM is to answer questions about various data sources related to opioid overdoses, using a metadata \
file that contains data about what each data measure is and what source it comes from. The responses from this LLM \
will be used to help the user to determine which data measures they should look at if they are interested in certain topics.
I will provide you with a topic, and you must generate three prompts that can be used to evaluate the effectiveness \
of this LLM. Try to make the prompts as varied as possible to ensure thorough evaluation of this LLM.
For thorough evaluation of the LLM, be sure to include noisy/unclear prompts too (and do not include any disambiguation notes).
Examples of potential types of prompts could be thorough like \"What measure should I look at if I am interested in \
non-fatal hospitalizations involving heroin?\" or may be short and simple, like \"EMS data\". Please provide \
these prompts in a consistent output format through JSON, of format {'prompt_1':'...', 'prompt_2':'...', 'prompt_3':'...'}.
Ensure that your output can be properly parsed into a JSON object and is enclosed in json``` ``` tags.";

pub const FILTER_SYSTEM_PROMPT: &str = "\
The data provided to you is a JSON file containing topics, and three prompts for each topic.
Your job is to filter these down to leave just one prompt for each topic.
The purpose of these prompts is to evaluate the effectiveness of an LLM in answering questions about \
data sources related to opioid overdoses, using a metadata file about each data measure.
The filtered prompts should be varied and effective in their evaluation of the capabilities of the LLM.
Be sure to include both clear/thorough prompts and short/unclear prompts in the final output.
Please provide the output in the same format as the input, but with only one prompt for each topic.
Ensure it is JSON parseable and enclosed in json``` ``` tags.";

pub const ASSISTANT_SYSTEM_PROMPT: &str = "\
Please answer questions about the provided metadata file. Only use the data in this file to answer questions.
If a question does not pertain to the metadata file, just say so and do not attempt to answer.
Be sure to thoroughly check the provided metadata file before answering to ensure relevant data measures are included in your response.
If the query matches with a certain data measure, be sure to provide the dashboard URL in your response.
Be thorough in your response to ensure that all related or relevant measures are mentioned to the user.
If the query doesn't directly match with just one measure, then feel free to return multiple of the most similar measures, and the \
dashboard URLs for each of those as well.";

pub const JUDGE_SYSTEM_PROMPT: &str = "\
Your job is to evaluate a prompt/response pair to determine if the response is adequate.
The prompts concern data measures stored in a metadata file provided to you, and the answers were LLM-generated.
When evaluating these responses, use the metadata file for help and specifically answer these four questions:
1. Is the question appropriately answered in a relevant and understandable way without misinterpretation?
2. Does the response provide relevant measures/dashboards that addresses all parts of the question without ignoring any important available measures/dashboards?
3. Does the response acknowledge a lack of appropriate data when applicable, rather than hallucinating fake measures?
4. Is the data source and description accurately described, when applicable?
Answer each of these four questions with a yes/no response, and if the answer is no, provide a justification.
IMPORTANT: Please format your answer into a parseable JSON object, of the format:
[{'question':'1', 'answer':'yes', 'justification':'...'}, {'question':'2', 'answer':'no', 'justification':'...'}, ...]
Ensure that this JSON object is enclosed in json``` ``` tags.";

/// Render a file attachment the way the assistant expects it inlined.
pub fn attachment(file_name: &str, content: &str) -> String {
    format!("[file name]: {file_name}\n[file content begin]{content}[file content end]")
}

/// Messages for one topic-to-prompts generation call.
pub fn generation_messages(topic: &str) -> Vec<Message> {
    vec![
        Message::system(GENERATION_SYSTEM_PROMPT),
        Message::user(format!("The topic is: {topic}\n")),
    ]
}

/// Messages for the single whole-file filtering call.
pub fn filter_messages(file_name: &str, file_content: &str) -> Vec<Message> {
    let user = format!(
        "Here is the input JSON file.\n{}",
        attachment(file_name, file_content)
    );
    vec![Message::system(FILTER_SYSTEM_PROMPT), Message::user(user)]
}

/// Messages for one assistant call with the metadata catalog attached.
pub fn assistant_messages(prompt: &str, metadata_json: &str) -> Vec<Message> {
    let user = format!(
        "{prompt}\n{}",
        attachment("metadata.json", metadata_json)
    );
    vec![Message::system(ASSISTANT_SYSTEM_PROMPT), Message::user(user)]
}

/// Messages for one judge call over a prompt/response pair.
pub fn judge_messages(prompt: &str, response: &str, metadata_json: &str) -> Vec<Message> {
    let user = format!(
        "PROMPT: {prompt}\nRESPONSE: {response}\n{}",
        attachment("metadata.json", metadata_json)
    );
    vec![Message::system(JUDGE_SYSTEM_PROMPT), Message::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Role;

    #[test]
    fn generation_messages_carry_topic() {
        let msgs = generation_messages("naloxone distribution");
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::System);
        assert!(msgs[1].content.contains("The topic is: naloxone distribution"));
    }

    #[test]
    fn attachment_wraps_content_markers() {
        let a = attachment("metadata.json", "{\"OD-1\": {}}");
        assert!(a.starts_with("[file name]: metadata.json\n"));
        assert!(a.contains("[file content begin]{\"OD-1\": {}}[file content end]"));
    }

    #[test]
    fn judge_messages_embed_pair_and_metadata() {
        let msgs = judge_messages("EMS data", "See measure OD-2.", "{}");
        assert!(msgs[1].content.contains("PROMPT: EMS data"));
        assert!(msgs[1].content.contains("RESPONSE: See measure OD-2."));
        assert!(msgs[1].content.contains("[file content begin]{}[file content end]"));
    }

    #[test]
    fn rubric_has_four_questions() {
        assert_eq!(RUBRIC_QUESTIONS.len(), 4);
        for q in RUBRIC_QUESTIONS {
            assert!(q.ends_with('?'));
        }
    }
}
