// Filtrage multi-critères des posts, en mémoire sur toute la collection.
// Fonction pure : aucune dépendance à la BD, testable directement.

use crate::models::dto::PostFilterRequest;
use crate::models::posts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortOrder {
    Newest,
    Oldest,
    Title,
}

impl SortOrder {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "newest" => Some(SortOrder::Newest),
            "oldest" => Some(SortOrder::Oldest),
            "title" => Some(SortOrder::Title),
            _ => None,
        }
    }
}

/// Critère renseigné ? (une chaîne vide compte comme absente)
fn criterion(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn matches(post: &posts::Model, filter: &PostFilterRequest) -> bool {
    if let Some(program) = criterion(&filter.program) {
        if !post.program.eq_ignore_ascii_case(program) {
            return false;
        }
    }
    if let Some(course) = criterion(&filter.course) {
        if !post.course.eq_ignore_ascii_case(course) {
            return false;
        }
    }
    if let Some(resource_type) = criterion(&filter.resource_type) {
        if !post.resource_type.eq_ignore_ascii_case(resource_type) {
            return false;
        }
    }
    // Sous-chaîne sensible à la casse : "pdf" trouve "application/pdf"
    if let Some(file_type) = criterion(&filter.file_type) {
        if !post.file_type.contains(file_type) {
            return false;
        }
    }
    if let Some(keyword) = criterion(&filter.keyword) {
        let keyword = keyword.to_lowercase();
        let in_title = post.title.to_lowercase().contains(&keyword);
        let in_description = post.description.to_lowercase().contains(&keyword);
        if !in_title && !in_description {
            return false;
        }
    }
    true
}

pub fn filter_posts(posts: Vec<posts::Model>, filter: &PostFilterRequest) -> Vec<posts::Model> {
    let mut filtered: Vec<posts::Model> = posts.into_iter().filter(|p| matches(p, filter)).collect();

    // sort_by est stable : à égalité, l'ordre d'origine est conservé
    match criterion(&filter.sort).and_then(SortOrder::parse) {
        Some(SortOrder::Newest) => filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        Some(SortOrder::Oldest) => filtered.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        Some(SortOrder::Title) => filtered.sort_by_key(|p| p.title.to_lowercase()),
        None => {}
    }

    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn post(title: &str, program: &str, minutes: i64) -> posts::Model {
        let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes);
        posts::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: title.to_string(),
            description: format!("Notes for {}", title),
            thumbnail: None,
            is_blacklisted: false,
            file_type: "application/pdf".to_string(),
            file_name: "notes.pdf".to_string(),
            file_url: "http://files/notes.pdf".to_string(),
            file_key: "key-notes.pdf".to_string(),
            program: program.to_string(),
            course: "CSI2110".to_string(),
            resource_type: "Notes".to_string(),
            semester: None,
            created_at,
            updated_at: created_at,
        }
    }

    fn titles(posts: &[posts::Model]) -> Vec<&str> {
        posts.iter().map(|p| p.title.as_str()).collect()
    }

    #[test]
    fn test_program_filter_is_case_insensitive_and_keeps_order() {
        let posts = vec![post("a", "CS", 10), post("b", "cs", 5), post("c", "EE", 0)];
        let filter = PostFilterRequest {
            program: Some("CS".to_string()),
            ..Default::default()
        };

        assert_eq!(titles(&filter_posts(posts, &filter)), vec!["a", "b"]);
    }

    #[test]
    fn test_oldest_sort_is_non_decreasing() {
        let posts = vec![post("a", "CS", 10), post("b", "cs", 5), post("c", "CS", 7)];
        let filter = PostFilterRequest {
            program: Some("cs".to_string()),
            sort: Some("OLDEST".to_string()),
            ..Default::default()
        };

        let result = filter_posts(posts, &filter);
        assert!(result.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        assert_eq!(titles(&result), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_newest_and_title_sort() {
        let posts = vec![post("beta", "CS", 0), post("Alpha", "CS", 20), post("gamma", "CS", 10)];

        let newest = PostFilterRequest { sort: Some("newest".to_string()), ..Default::default() };
        assert_eq!(titles(&filter_posts(posts.clone(), &newest)), vec!["Alpha", "gamma", "beta"]);

        let by_title = PostFilterRequest { sort: Some("title".to_string()), ..Default::default() };
        assert_eq!(titles(&filter_posts(posts, &by_title)), vec!["Alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_empty_criteria_and_unknown_sort_are_ignored() {
        let posts = vec![post("a", "CS", 10), post("b", "EE", 0)];
        let filter = PostFilterRequest {
            program: Some(String::new()),
            keyword: Some(String::new()),
            sort: Some("popular".to_string()),
            ..Default::default()
        };

        assert_eq!(titles(&filter_posts(posts, &filter)), vec!["a", "b"]);
    }

    #[test]
    fn test_keyword_and_file_type() {
        let mut image = post("Diagram", "CS", 0);
        image.file_type = "image/png".to_string();
        let posts = vec![post("Midterm review", "CS", 0), image];

        let keyword = PostFilterRequest { keyword: Some("MIDTERM".to_string()), ..Default::default() };
        assert_eq!(titles(&filter_posts(posts.clone(), &keyword)), vec!["Midterm review"]);

        // le mot-clé cherche aussi dans la description
        let in_desc = PostFilterRequest { keyword: Some("notes for diagram".to_string()), ..Default::default() };
        assert_eq!(titles(&filter_posts(posts.clone(), &in_desc)), vec!["Diagram"]);

        let file_type = PostFilterRequest { file_type: Some("pdf".to_string()), ..Default::default() };
        assert_eq!(titles(&filter_posts(posts, &file_type)), vec!["Midterm review"]);
    }
}
