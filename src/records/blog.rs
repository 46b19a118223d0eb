use serde::{ Deserialize, Serialize };
use uuid::Uuid;

const EXCERPT_CHARS: usize = 120;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    pub author: String,
    pub excerpt: String,
    pub image_url: String,
}

#[derive(Clone, Debug)]
pub struct BlogBoard {
    posts: Vec<BlogPost>,
}

impl BlogBoard {
    pub fn with_samples() -> Self {
        let post = |id: &str, title: &str, author: &str, excerpt: &str| BlogPost {
            id: id.to_string(),
            title: title.to_string(),
            author: author.to_string(),
            excerpt: excerpt.to_string(),
            image_url: String::new(),
        };
        Self {
            posts: vec![
                post(
                    "1",
                    "Understanding the New Data Protection Act 2023",
                    "Barr. Chioma",
                    "A breakdown of the implications for Nigerian businesses..."
                ),
                post(
                    "2",
                    "Tenancy Laws in Lagos: A Guide for Landlords",
                    "Mr. Adebayo",
                    "What you need to know about the tenancy law of Lagos State 2011..."
                ),
                post(
                    "3",
                    "Supreme Court Ruling on Election Tribunal",
                    "Legal Insider",
                    "Key takeaways from the recent judgement delivered..."
                )
            ],
        }
    }

    pub fn posts(&self) -> &[BlogPost] {
        &self.posts
    }

    /// Publishes a generated article. The title is its first non-empty line
    /// (markdown heading markers stripped), falling back to the topic.
    pub fn publish(&mut self, topic: &str, author: &str, article: &str) -> &BlogPost {
        let mut lines = article.lines().map(str::trim).filter(|l| !l.is_empty());
        let title = lines
            .next()
            .map(|l| l.trim_start_matches('#').trim().trim_matches('*').trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| topic.to_string());
        let body: String = lines.collect::<Vec<_>>().join(" ");
        let mut excerpt: String = body.chars().take(EXCERPT_CHARS).collect();
        if body.chars().count() > EXCERPT_CHARS {
            excerpt.push_str("...");
        }

        self.posts.insert(0, BlogPost {
            id: Uuid::new_v4().to_string(),
            title,
            author: author.to_string(),
            excerpt,
            image_url: String::new(),
        });
        &self.posts[0]
    }
}

impl Default for BlogBoard {
    fn default() -> Self {
        Self::with_samples()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_derives_title_and_excerpt() {
        let mut board = BlogBoard::with_samples();
        let article = format!("## **Land Use Act Explained**\n\n{}", "word ".repeat(60));
        let post = board.publish("Land Use Act", "U-Practice", &article).clone();

        assert_eq!(post.title, "Land Use Act Explained");
        assert!(post.excerpt.ends_with("..."));
        assert_eq!(post.excerpt.chars().count(), EXCERPT_CHARS + 3);
        assert_eq!(board.posts().len(), 4);
        assert_eq!(board.posts()[0], post);
    }

    #[test]
    fn empty_article_falls_back_to_topic() {
        let mut board = BlogBoard::with_samples();
        let post = board.publish("Bail in Nigeria", "U-Practice", "\n\n");
        assert_eq!(post.title, "Bail in Nigeria");
        assert!(post.excerpt.is_empty());
    }
}
