//! Message wording for the follow-up conversation

/// Title of the private message asking the author for feedback
pub const FOLLOW_UP_TITLE: &str = "Follow Up on Your Recent Post";

/// Title of the thank-you sent to repliers after a "yes"
pub const HELPED_TITLE: &str = "You helped a user!";

pub fn ask_prompt(username: &str, topic_url: &str) -> String {
    format!(
        "Hi {username}, \n\
         On this topic you posted, did you get the support you needed? \n \
         {topic_url} \n\
         Reply to this message with YES if you feel supported, or NO if you don't."
    )
}

pub fn yes_reply(form_url: &str) -> String {
    format!(
        "Thank you for your feedback! \n\
         Click on the form and answer the one question because it will help us know \
         specifically what helped: <a href='{form_url}' target='_blank'>{form_url}</a> \n"
    )
}

pub fn no_reply(form_url: &str) -> String {
    format!(
        "Thank you for sharing that with us. We'll get you more support. \n\
         Click on the form and answer the one question because it will help us know \
         how we can improve: <a href='{form_url}' target='_blank'>{form_url}</a>"
    )
}

pub fn helped_user(author: &str, topic_url: &str) -> String {
    format!(
        "A user you supported named {author} said that your replies helped them feel \
         cared for. Thank you so much for offering support to them. It's making a real \
         difference. If you want to check out the topic you can find it here: {topic_url}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_author_and_link() {
        let text = ask_prompt("sam", "https://forum.example/t/5");
        assert!(text.starts_with("Hi sam, \nOn this topic"));
        assert!(text.contains("https://forum.example/t/5 \n"));
        assert!(text.ends_with("or NO if you don't."));
    }

    #[test]
    fn test_replies_link_forms() {
        assert!(yes_reply("https://f/yes").contains("href='https://f/yes'"));
        assert!(no_reply("https://f/no").contains("We'll get you more support"));
        assert!(helped_user("sam", "u").contains("named sam said"));
    }
}
