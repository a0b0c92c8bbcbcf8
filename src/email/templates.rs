//! HTML bodies for transactional mail.

/// Welcome mail sent after signup.
pub fn welcome(name: &str, profile_url: &str) -> (String, String) {
    let subject = "Welcome to Lattice".to_string();
    let body = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h1>Welcome, {name}!</h1>
  <p>We're glad to have you on Lattice. Your professional network starts here.</p>
  <p>Complete your profile to help others find you:</p>
  <p><a href="{profile_url}" style="color: #0a66c2;">Go to your profile</a></p>
</div>"#,
    );
    (subject, body)
}

/// Sent to the original sender when their request is accepted.
pub fn connection_accepted(
    sender_name: &str,
    recipient_name: &str,
    profile_url: &str,
) -> (String, String) {
    let subject = format!("{recipient_name} accepted your connection request");
    let body = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h1>Congratulations, {sender_name}!</h1>
  <p><strong>{recipient_name}</strong> accepted your connection request on Lattice.</p>
  <p><a href="{profile_url}" style="color: #0a66c2;">View their profile</a></p>
</div>"#,
    );
    (subject, body)
}

/// Sent to a post author when someone else comments.
pub fn comment_notification(
    recipient_name: &str,
    commenter_name: &str,
    post_url: &str,
    comment_content: &str,
) -> (String, String) {
    let subject = format!("{commenter_name} commented on your post");
    let body = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h1>New comment on your post</h1>
  <p>Hi {recipient_name}, <strong>{commenter_name}</strong> commented:</p>
  <blockquote style="border-left: 3px solid #0a66c2; padding-left: 12px; color: #444;">{comment_content}</blockquote>
  <p><a href="{post_url}" style="color: #0a66c2;">View the post</a></p>
</div>"#,
    );
    (subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_mentions_name_and_link() {
        let (subject, body) = welcome("Ada", "https://example.com/profile/ada");
        assert_eq!(subject, "Welcome to Lattice");
        assert!(body.contains("Ada"));
        assert!(body.contains("https://example.com/profile/ada"));
    }

    #[test]
    fn connection_accepted_names_both_parties() {
        let (subject, body) =
            connection_accepted("Ada", "Grace", "https://example.com/profile/grace");
        assert!(subject.contains("Grace"));
        assert!(body.contains("Ada"));
        assert!(body.contains("Grace"));
    }

    #[test]
    fn comment_notification_quotes_the_comment() {
        let (subject, body) = comment_notification(
            "Ada",
            "Grace",
            "https://example.com/post/1",
            "Great post!",
        );
        assert!(subject.contains("Grace"));
        assert!(body.contains("Great post!"));
        assert!(body.contains("https://example.com/post/1"));
    }
}
