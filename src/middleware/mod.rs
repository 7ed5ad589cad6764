/*!
 * Middleware Module
 *
 * Contains HTTP middleware layers applied to the router.
 */

pub mod cors;

pub use cors::cors_from_env;
