// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque modèle correspond à une table avec SeaORM.
//
// Liste des modules:
//   - users : Utilisateurs (auth classique + OAuth Google)
//   - posts : Ressources partagées (fichier + catégorie)
//   - follows : Graphe follower -> following (une ligne par arête)
//   - post_likes : Likes (post, user)
//   - saved_posts : Posts sauvegardés par un user
//   - reported_posts : Posts signalés par un user (blacklist)
//   - text_extracts : Texte extrait des fichiers (écrit par le worker d'extraction)
//   - summaries : Résumés générés (écrit par le worker d'extraction)
//   - dto : Data Transfer Objects pour les requêtes/réponses API
//
// Points d'attention:
//   - Les relations many-to-many sont des tables à clé primaire composite,
//     donc un doublon est impossible même avec deux requêtes concurrentes
//   - Les listes "followers"/"followings" sont dérivées de la même table
//     follows : la symétrie est garantie par construction
//
// ============================================================================

pub mod users;
pub mod posts;
pub mod follows;
pub mod post_likes;
pub mod saved_posts;
pub mod reported_posts;
pub mod text_extracts;
pub mod summaries;
pub mod dto;
