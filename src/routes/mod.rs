//! The route registry: an ordered map from URL route patterns to the page
//! modules that serve them, extracted from the framework routing modules.

pub mod constants;

use std::collections::HashSet;

use anyhow::{Context, Result, bail};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tree_sitter::Node;

use crate::ast::literal::eval_string;
use crate::ast::{SourceCache, node_text, walk_tree};
use crate::context::AnalyzerContext;
use crate::overrides::{CONSTANTS_ROOT_IDENTIFIER, MANUAL_ROUTE_MODULES, ROUTING_MODULES};
use crate::resolver::ImportResolver;

use constants::ConstantsRegistry;

/// A URL route pattern. `path` is the full slash-joined pattern with parent
/// prefixes applied; segments beginning with `:` match any URL segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Route {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_match: Option<String>,
}

/// Ordered route-pattern → page-module map. The initial entries are the manual
/// overrides; duplicates of an already-registered pattern are never
/// overwritten (first definition wins).
#[derive(Debug)]
pub struct RouteRegistry {
    pub routes: IndexMap<Route, String>,
}

impl RouteRegistry {
    /// Build the registry from the well-known routing modules. A routing
    /// module that does not exist in this repository is skipped; one that
    /// exists but cannot be read or parsed is a fatal config error.
    pub fn build(
        ctx: &AnalyzerContext,
        cache: &mut SourceCache,
        resolver: &ImportResolver,
        constants: &ConstantsRegistry,
    ) -> Result<Self> {
        let mut routes: IndexMap<Route, String> = IndexMap::new();

        for (path, path_match, module) in MANUAL_ROUTE_MODULES {
            insert_first_wins(
                &mut routes,
                Route {
                    path: (*path).to_owned(),
                    path_match: path_match.map(str::to_owned),
                },
                (*module).to_owned(),
            );
        }

        let extractor = RouteExtractor {
            ctx,
            resolver,
            constants,
        };
        let mut visited: HashSet<(String, String)> = HashSet::new();

        for routing_module in ROUTING_MODULES {
            if !ctx.is_file(routing_module) {
                continue;
            }
            extractor.extract_file(cache, routing_module, "", None, &mut visited, &mut routes)?;
        }

        Ok(Self { routes })
    }

    /// The set of page modules in registration order.
    pub fn page_modules(&self) -> IndexSet<String> {
        self.routes.values().cloned().collect()
    }
}

fn insert_first_wins(routes: &mut IndexMap<Route, String>, route: Route, module: String) {
    routes.entry(route).or_insert(module);
}

struct RouteExtractor<'a> {
    ctx: &'a AnalyzerContext,
    resolver: &'a ImportResolver<'a>,
    constants: &'a ConstantsRegistry,
}

impl RouteExtractor<'_> {
    /// Extract every route declared in `file`, prefixing paths with `prefix`
    /// and using `fallback_module` for `component`-only entries.
    fn extract_file(
        &self,
        cache: &mut SourceCache,
        file: &str,
        prefix: &str,
        fallback_module: Option<&str>,
        visited: &mut HashSet<(String, String)>,
        routes: &mut IndexMap<Route, String>,
    ) -> Result<()> {
        if !visited.insert((file.to_owned(), prefix.to_owned())) {
            return Ok(());
        }

        let parsed = cache
            .load(self.ctx, file)
            .with_context(|| format!("failed to load routing module {file}"))?;
        let root = parsed.tree.root_node();
        let source = parsed.source.as_str();

        let array = match self.find_routes_array(root, source, file)? {
            Some(a) => a,
            None => return Ok(()),
        };

        let mut cursor = array.walk();
        let elements: Vec<Node> = array
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "object")
            .collect();
        for element in elements {
            self.extract_route_object(
                element,
                source,
                file,
                prefix,
                fallback_module,
                cache,
                visited,
                routes,
            )?;
        }

        Ok(())
    }

    /// Locate the router-module argument: a top-level `routes` constant, or
    /// the first argument to `RouterModule.forRoot(...)` / `forChild(...)`
    /// (resolving an identifier argument to its initializer in the same file).
    fn find_routes_array<'t>(
        &self,
        root: Node<'t>,
        source: &str,
        file: &str,
    ) -> Result<Option<Node<'t>>> {
        if let Some(value) = top_level_declarator_value(root, source, "routes") {
            if value.kind() == "array" {
                return Ok(Some(value));
            }
        }

        let mut argument: Option<Node> = None;
        walk_tree(root, &mut |node| {
            if argument.is_some() {
                return false;
            }
            if node.kind() == "call_expression" {
                if let Some(function) = node.child_by_field_name("function") {
                    if function.kind() == "member_expression" {
                        let object = function.child_by_field_name("object");
                        let property = function.child_by_field_name("property");
                        let is_router_registration = object
                            .map(|o| node_text(o, source) == "RouterModule")
                            .unwrap_or(false)
                            && property
                                .map(|p| {
                                    matches!(node_text(p, source), "forRoot" | "forChild")
                                })
                                .unwrap_or(false);
                        if is_router_registration {
                            if let Some(arguments) = node.child_by_field_name("arguments") {
                                let mut cursor = arguments.walk();
                                argument = arguments
                                    .named_children(&mut cursor)
                                    .find(|n| n.kind() != "comment");
                            }
                        }
                    }
                }
            }
            true
        });

        match argument {
            None => Ok(None),
            Some(node) if node.kind() == "array" => Ok(Some(node)),
            Some(node) if node.kind() == "identifier" => {
                let name = node_text(node, source);
                match top_level_declarator_value(root, source, name) {
                    Some(value) if value.kind() == "array" => Ok(Some(value)),
                    _ => bail!(
                        "Router registration argument '{name}' in {file} does not name a \
                         top-level route array"
                    ),
                }
            }
            Some(node) => bail!(
                "Router registration argument '{}' in {file} is neither an array literal \
                 nor an identifier",
                node_text(node, source)
            ),
        }
    }

    /// Parse one route object literal and recurse into its children and any
    /// lazily loaded module.
    #[allow(clippy::too_many_arguments)]
    fn extract_route_object(
        &self,
        object: Node,
        source: &str,
        file: &str,
        prefix: &str,
        fallback_module: Option<&str>,
        cache: &mut SourceCache,
        visited: &mut HashSet<(String, String)>,
        routes: &mut IndexMap<Route, String>,
    ) -> Result<()> {
        let path = match pair_value(object, source, "path") {
            Some(value) => self.route_path(value, source, file)?,
            None => String::new(),
        };
        let path_match = pair_value(object, source, "pathMatch")
            .map(|value| eval_string(value, source, file))
            .transpose()?;
        let full_path = concat_route_paths(prefix, &path);

        let lazy_module = pair_value(object, source, "loadChildren")
            .map(|value| self.lazy_module_target(value, source, file))
            .transpose()?;

        if let Some(module) = &lazy_module {
            insert_first_wins(
                routes,
                Route {
                    path: full_path.clone(),
                    path_match: path_match.clone(),
                },
                module.clone(),
            );
            // A lazily loaded module carries its own routes; pick them up with
            // this route's full path as the prefix.
            self.extract_file(cache, module, &full_path, Some(module.as_str()), visited, routes)?;
        } else if pair_value(object, source, "component").is_some() {
            if let Some(module) = fallback_module {
                insert_first_wins(
                    routes,
                    Route {
                        path: full_path.clone(),
                        path_match: path_match.clone(),
                    },
                    module.to_owned(),
                );
            }
        }

        let child_fallback: Option<&str> = lazy_module.as_deref().or(fallback_module);
        if let Some(children) = pair_value(object, source, "children") {
            if children.kind() == "array" {
                let mut cursor = children.walk();
                let elements: Vec<Node> = children
                    .named_children(&mut cursor)
                    .filter(|n| n.kind() == "object")
                    .collect();
                for child in elements {
                    self.extract_route_object(
                        child,
                        source,
                        file,
                        &full_path,
                        child_fallback,
                        cache,
                        visited,
                        routes,
                    )?;
                }
            }
        }

        Ok(())
    }

    /// A route `path` is a string literal or an `AppConstants.*` access chain.
    fn route_path(&self, value: Node, source: &str, file: &str) -> Result<String> {
        if let Ok(literal) = eval_string(value, source, file) {
            return Ok(literal);
        }

        if value.kind() == "member_expression" {
            if let Some(chain) = access_chain(value, source) {
                if chain.first().map(String::as_str) == Some(CONSTANTS_ROOT_IDENTIFIER) {
                    if let Some(resolved) = self.constants.lookup(&chain[1..]) {
                        return Ok(resolved.to_owned());
                    }
                }
            }
        }

        bail!(
            "Route path '{}' in {file} is neither a string literal nor a resolvable \
             {CONSTANTS_ROOT_IDENTIFIER}.* access",
            node_text(value, source)
        )
    }

    /// Extract and resolve the argument of the `import(...)` call inside a
    /// `loadChildren` initializer.
    fn lazy_module_target(&self, value: Node, source: &str, file: &str) -> Result<String> {
        let mut import_argument: Option<Node> = None;
        walk_tree(value, &mut |node| {
            if import_argument.is_some() {
                return false;
            }
            if node.kind() == "call_expression" {
                let is_dynamic_import = node
                    .child_by_field_name("function")
                    .map(|f| f.kind() == "import")
                    .unwrap_or(false);
                if is_dynamic_import {
                    if let Some(arguments) = node.child_by_field_name("arguments") {
                        let mut cursor = arguments.walk();
                        import_argument = arguments
                            .named_children(&mut cursor)
                            .find(|n| n.kind() != "comment");
                    }
                }
            }
            true
        });

        let argument = match import_argument {
            Some(a) => a,
            None => bail!(
                "loadChildren initializer '{}' in {file} does not return an import(...) call",
                node_text(value, source)
            ),
        };

        let specifier = eval_string(argument, source, file)?;
        match self.resolver.resolve(&specifier, file) {
            Some(target) if self.ctx.is_file(&target) => Ok(target),
            Some(target) => bail!(
                "Lazily loaded module '{target}' referenced by {file} (specifier \
                 '{specifier}') does not exist"
            ),
            None => bail!(
                "Lazily loaded module specifier '{specifier}' in {file} resolves outside \
                 the repository"
            ),
        }
    }
}

/// The value node of an object-literal property, matched by key text
/// (quoted or bare).
fn pair_value<'t>(object: Node<'t>, source: &str, key: &str) -> Option<Node<'t>> {
    let mut cursor = object.walk();
    for pair in object.children(&mut cursor) {
        if pair.kind() != "pair" {
            continue;
        }
        let key_node = match pair.child_by_field_name("key") {
            Some(k) => k,
            None => continue,
        };
        let key_text = node_text(key_node, source);
        if key_text.trim_matches(|c| c == '\'' || c == '"') != key {
            continue;
        }
        return pair.child_by_field_name("value");
    }
    None
}

/// The value node of a top-level `const <name> = ...` declarator, unwrapping
/// an export statement and any `as` type assertion.
fn top_level_declarator_value<'t>(
    root: Node<'t>,
    source: &str,
    name: &str,
) -> Option<Node<'t>> {
    let mut cursor = root.walk();
    for top in root.children(&mut cursor) {
        let declaration = if top.kind() == "export_statement" {
            match crate::ast::find_child_of_kind(top, "lexical_declaration")
                .or_else(|| crate::ast::find_child_of_kind(top, "variable_declaration"))
            {
                Some(d) => d,
                None => continue,
            }
        } else if matches!(top.kind(), "lexical_declaration" | "variable_declaration") {
            top
        } else {
            continue;
        };

        let mut declaration_cursor = declaration.walk();
        for declarator in declaration.children(&mut declaration_cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let matches_name = declarator
                .child_by_field_name("name")
                .map(|n| node_text(n, source) == name)
                .unwrap_or(false);
            if !matches_name {
                continue;
            }
            let value = declarator.child_by_field_name("value")?;
            return Some(if value.kind() == "as_expression" {
                value.named_child(0).unwrap_or(value)
            } else {
                value
            });
        }
    }
    None
}

/// Flatten a property-access chain (`A.B.C`) into its identifier parts.
/// Returns `None` for chains containing computed or call segments.
fn access_chain(node: Node, source: &str) -> Option<Vec<String>> {
    match node.kind() {
        "identifier" => Some(vec![node_text(node, source).to_owned()]),
        "member_expression" => {
            let object = node.child_by_field_name("object")?;
            let property = node.child_by_field_name("property")?;
            if property.kind() != "property_identifier" {
                return None;
            }
            let mut chain = access_chain(object, source)?;
            chain.push(node_text(property, source).to_owned());
            Some(chain)
        }
        _ => None,
    }
}

/// Join a parent route prefix with a child path. An empty side reproduces the
/// other side exactly.
fn concat_route_paths(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_owned()
    } else if path.is_empty() {
        prefix.to_owned()
    } else {
        format!("{prefix}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    const MAIN_ROUTING: &str = "core/templates/pages/root/routing/app.routing.module.ts";

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn build_registry(dir: &tempfile::TempDir) -> Result<RouteRegistry> {
        let ctx = AnalyzerContext::load(dir.path()).unwrap();
        let resolver = ImportResolver::new(&ctx);
        let mut cache = SourceCache::new();
        let constants = ConstantsRegistry::load(&ctx, &mut cache)?;
        RouteRegistry::build(&ctx, &mut cache, &resolver, &constants)
    }

    fn module_for<'r>(registry: &'r RouteRegistry, path: &str) -> Option<&'r str> {
        registry
            .routes
            .iter()
            .find(|(route, _)| route.path == path)
            .map(|(_, module)| module.as_str())
    }

    #[test]
    fn test_manual_overrides_are_initial_entries() {
        let dir = tempfile::tempdir().unwrap();
        let registry = build_registry(&dir).unwrap();
        let first = registry.routes.keys().next().unwrap();
        assert_eq!(first.path, "topic_editor/:topic_id");
        assert_eq!(first.path_match.as_deref(), Some("full"));
    }

    #[test]
    fn test_lazy_route_from_routes_constant() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "core/templates/pages/root/routing/pages/about/about-page.module.ts",
            "export class AboutPageModule {}",
        );
        write(
            dir.path(),
            MAIN_ROUTING,
            r"
            const routes = [
              {
                path: 'about',
                loadChildren: () =>
                  import('./pages/about/about-page.module').then(m => m.AboutPageModule)
              }
            ];
            ",
        );
        let registry = build_registry(&dir).unwrap();
        assert_eq!(
            module_for(&registry, "about"),
            Some("core/templates/pages/root/routing/pages/about/about-page.module.ts")
        );
    }

    #[test]
    fn test_for_root_identifier_indirection() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "core/templates/pages/root/routing/learn.module.ts",
            "",
        );
        write(
            dir.path(),
            MAIN_ROUTING,
            r"
            const appRoutes = [
              {
                path: 'learn',
                pathMatch: 'full',
                loadChildren: () => import('./learn.module').then(m => m.LearnModule)
              }
            ];

            @NgModule({
              imports: [RouterModule.forRoot(appRoutes)]
            })
            export class AppRoutingModule {}
            ",
        );
        let registry = build_registry(&dir).unwrap();
        let (route, module) = registry
            .routes
            .iter()
            .find(|(r, _)| r.path == "learn")
            .unwrap();
        assert_eq!(route.path_match.as_deref(), Some("full"));
        assert_eq!(module, "core/templates/pages/root/routing/learn.module.ts");
    }

    #[test]
    fn test_children_concatenate_paths_and_fall_back_to_parent_module() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "core/templates/pages/root/routing/profile.module.ts",
            "",
        );
        write(
            dir.path(),
            MAIN_ROUTING,
            r"
            const routes = [
              {
                path: 'profile',
                loadChildren: () => import('./profile.module').then(m => m.ProfileModule),
                children: [
                  { path: 'settings', component: SettingsComponent },
                  { path: '', component: OverviewComponent }
                ]
              }
            ];
            ",
        );
        let registry = build_registry(&dir).unwrap();
        let module = "core/templates/pages/root/routing/profile.module.ts";
        assert_eq!(module_for(&registry, "profile"), Some(module));
        assert_eq!(module_for(&registry, "profile/settings"), Some(module));
        // Empty child path reproduces the parent path; the parent entry
        // already exists, and first definition wins.
        assert_eq!(module_for(&registry, "profile"), Some(module));
    }

    #[test]
    fn test_app_constants_route_path() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "assets/constants.ts",
            "export default { PAGES: { DONATE: { ROUTE: 'donate' } } };",
        );
        write(
            dir.path(),
            "core/templates/pages/root/routing/donate.module.ts",
            "",
        );
        write(
            dir.path(),
            MAIN_ROUTING,
            r"
            const routes = [
              {
                path: AppConstants.PAGES.DONATE.ROUTE,
                loadChildren: () => import('./donate.module').then(m => m.DonateModule)
              }
            ];
            ",
        );
        let registry = build_registry(&dir).unwrap();
        assert_eq!(
            module_for(&registry, "donate"),
            Some("core/templates/pages/root/routing/donate.module.ts")
        );
    }

    #[test]
    fn test_unresolvable_path_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "core/templates/pages/root/routing/x.module.ts",
            "",
        );
        write(
            dir.path(),
            MAIN_ROUTING,
            r"
            const routes = [
              {
                path: computePath(),
                loadChildren: () => import('./x.module').then(m => m.XModule)
              }
            ];
            ",
        );
        let err = build_registry(&dir).unwrap_err();
        assert!(err.to_string().contains("computePath()"));
    }

    #[test]
    fn test_missing_lazy_module_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            MAIN_ROUTING,
            r"
            const routes = [
              {
                path: 'ghost',
                loadChildren: () => import('./ghost.module.ts').then(m => m.GhostModule)
              }
            ];
            ",
        );
        let err = build_registry(&dir).unwrap_err();
        assert!(err.to_string().contains("ghost.module.ts"));
    }

    #[test]
    fn test_duplicate_paths_first_definition_wins() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "core/templates/pages/root/routing/a.module.ts", "");
        write(dir.path(), "core/templates/pages/root/routing/b.module.ts", "");
        write(
            dir.path(),
            MAIN_ROUTING,
            r"
            const routes = [
              { path: 'dup', loadChildren: () => import('./a.module').then(m => m.A) },
              { path: 'dup', loadChildren: () => import('./b.module').then(m => m.B) }
            ];
            ",
        );
        let registry = build_registry(&dir).unwrap();
        assert_eq!(
            module_for(&registry, "dup"),
            Some("core/templates/pages/root/routing/a.module.ts")
        );
    }

    #[test]
    fn test_lazy_module_child_routes_are_prefixed() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "core/templates/pages/root/routing/store/store.module.ts",
            r"
            const routes = [
              { path: 'cart', component: CartComponent }
            ];

            @NgModule({ imports: [RouterModule.forChild(routes)] })
            export class StoreModule {}
            ",
        );
        write(
            dir.path(),
            MAIN_ROUTING,
            r"
            const routes = [
              {
                path: 'store',
                loadChildren: () => import('./store/store.module').then(m => m.StoreModule)
              }
            ];
            ",
        );
        let registry = build_registry(&dir).unwrap();
        let module = "core/templates/pages/root/routing/store/store.module.ts";
        assert_eq!(module_for(&registry, "store"), Some(module));
        assert_eq!(module_for(&registry, "store/cart"), Some(module));
    }

    #[test]
    fn test_concat_route_paths_empty_sides() {
        assert_eq!(concat_route_paths("", "child"), "child");
        assert_eq!(concat_route_paths("parent", ""), "parent");
        assert_eq!(concat_route_paths("parent", "child"), "parent/child");
    }
}
