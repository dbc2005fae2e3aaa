use backoffice_core::{DepartmentId, EmployeeId, ProjectId};
use chrono::Utc;
use proptest::prelude::*;

use crate::{
    DataScope, EmployeeScope, Grants, ModuleAllowList, PermissionContext, PermissionLogic,
    PermissionRequirement, PermissionSnapshot, RolePolicy, ScopeAnchors,
};

fn context(
    scope: DataScope,
    grants: Grants,
    allowed_modules: ModuleAllowList,
    can_manage_subordinates: bool,
    anchors: ScopeAnchors,
) -> PermissionContext {
    PermissionContext::new(PermissionSnapshot::new(
        EmployeeId::new(),
        RolePolicy {
            position_id: None,
            grants,
            data_scope: scope,
            can_manage_subordinates,
        },
        anchors,
        allowed_modules,
        Utc::now(),
    ))
}

fn grants(triples: &[(&str, &str, &str)]) -> Grants {
    match Grants::from_triples(triples.iter().copied()) {
        Ok(grants) => grants,
        Err(error) => panic!("test grants should parse: {error}"),
    }
}

fn allow_list(values: &[&str]) -> ModuleAllowList {
    match ModuleAllowList::parse(values) {
        Ok(list) => list,
        Err(error) => panic!("test allow-list should parse: {error}"),
    }
}

fn target(anchors: ScopeAnchors) -> EmployeeScope {
    EmployeeScope {
        employee_id: EmployeeId::new(),
        anchors,
    }
}

#[test]
fn department_allow_list_blocks_role_grant() {
    let context = context(
        DataScope::Group,
        grants(&[("finance", "flow", "view"), ("hr", "employee", "view")]),
        allow_list(&["finance.*"]),
        false,
        ScopeAnchors::default(),
    );

    assert!(context.has_permission("finance", Some("flow"), Some("view")));
    assert!(!context.has_permission("hr", Some("employee"), Some("view")));
    assert!(!context.has_permission("hr", None, None));
}

#[test]
fn hr_prefix_allows_hr_children_and_nothing_else() {
    let context = context(
        DataScope::SelfOnly,
        Grants::new(),
        allow_list(&["hr.*"]),
        false,
        ScopeAnchors::default(),
    );

    assert!(context.is_module_allowed("hr.employee"));
    assert!(context.is_module_allowed("hr"));
    assert!(!context.is_module_allowed("finance.flow"));
}

#[test]
fn missing_levels_are_denials() {
    let context = context(
        DataScope::All,
        grants(&[("finance", "flow", "view")]),
        ModuleAllowList::unrestricted(),
        false,
        ScopeAnchors::default(),
    );

    assert!(!context.has_permission("assets", None, None));
    assert!(!context.has_permission("finance", Some("ledger"), None));
    assert!(!context.has_permission("finance", Some("flow"), Some("delete")));
    assert!(context.has_permission("finance", Some("flow"), None));
}

#[test]
fn empty_action_list_grants_nothing() {
    let Ok(grants) = serde_json::from_str::<Grants>(r#"{"hr":{"employee":[]}}"#) else {
        panic!("grants json should decode");
    };
    let context = context(
        DataScope::All,
        grants,
        ModuleAllowList::unrestricted(),
        false,
        ScopeAnchors::default(),
    );

    assert!(!context.has_permission("hr", Some("employee"), None));
    assert!(!context.has_permission("hr", None, None));
    assert!(context.accessible_modules().is_empty());
}

#[test]
fn check_permissions_combines_with_and_or() {
    let context = context(
        DataScope::All,
        grants(&[("finance", "flow", "view")]),
        ModuleAllowList::unrestricted(),
        false,
        ScopeAnchors::default(),
    );
    let requirements = [
        PermissionRequirement::action("finance", "flow", "view"),
        PermissionRequirement::action("finance", "flow", "approve"),
    ];

    assert!(!context.check_permissions(&requirements, PermissionLogic::And));
    assert!(context.check_permissions(&requirements, PermissionLogic::Or));
    assert!(context.check_permissions(&[], PermissionLogic::And));
    assert!(!context.check_permissions(&[], PermissionLogic::Or));
}

#[test]
fn project_scope_requires_matching_project_anchor() {
    let p1 = ProjectId::new();
    let p2 = ProjectId::new();
    let actor_anchors = ScopeAnchors {
        project_id: Some(p1),
        group_id: None,
    };
    let context = context(
        DataScope::Project,
        Grants::new(),
        ModuleAllowList::unrestricted(),
        false,
        actor_anchors,
    );

    assert!(!context.can_access_data(&target(ScopeAnchors {
        project_id: Some(p2),
        group_id: None,
    })));
    assert!(context.can_access_data(&target(ScopeAnchors {
        project_id: Some(p1),
        group_id: None,
    })));
    assert!(!context.can_access_data(&target(ScopeAnchors::default())));
}

#[test]
fn unanchored_actor_never_matches_unanchored_target() {
    let context = context(
        DataScope::Group,
        Grants::new(),
        ModuleAllowList::unrestricted(),
        true,
        ScopeAnchors::default(),
    );

    assert!(!context.can_access_data(&target(ScopeAnchors::default())));
    assert!(!context.can_approve(&target(ScopeAnchors::default())));
}

#[test]
fn approval_requires_manage_flag_and_scope() {
    let group = DepartmentId::new();
    let anchors = ScopeAnchors {
        project_id: None,
        group_id: Some(group),
    };
    let manager = context(
        DataScope::Group,
        Grants::new(),
        ModuleAllowList::unrestricted(),
        true,
        anchors,
    );
    let peer = context(
        DataScope::Group,
        Grants::new(),
        ModuleAllowList::unrestricted(),
        false,
        anchors,
    );
    let applicant = target(anchors);

    assert!(manager.can_approve(&applicant));
    assert!(!peer.can_approve(&applicant));
    assert!(peer.can_access_data(&applicant));
    assert!(!manager.can_approve(&target(ScopeAnchors {
        project_id: None,
        group_id: Some(DepartmentId::new()),
    })));
}

#[test]
fn self_scope_manager_cannot_approve_others() {
    let manager = context(
        DataScope::SelfOnly,
        Grants::new(),
        ModuleAllowList::unrestricted(),
        true,
        ScopeAnchors::default(),
    );

    assert!(!manager.can_approve(&target(ScopeAnchors::default())));
}

#[test]
fn accessible_modules_respects_allow_list() {
    let context = context(
        DataScope::Project,
        grants(&[
            ("finance", "flow", "view"),
            ("hr", "employee", "view"),
            ("assets", "fixed", "view"),
        ]),
        allow_list(&["finance.*", "assets"]),
        false,
        ScopeAnchors::default(),
    );

    let modules: Vec<&str> = context
        .accessible_modules()
        .into_iter()
        .map(|module| module.as_str())
        .collect();
    assert_eq!(modules, vec!["assets", "finance"]);
}

fn data_scope_strategy() -> impl Strategy<Value = DataScope> {
    prop::sample::select(DataScope::all().to_vec())
}

fn identifier_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["hr", "finance", "assets", "approval"]).prop_map(str::to_owned)
}

fn grants_strategy() -> impl Strategy<Value = Grants> {
    prop::collection::vec(
        (
            identifier_strategy(),
            prop::sample::select(vec!["employee", "flow", "fixed", "leave"]),
            prop::sample::select(vec!["view", "edit", "approve"]),
        ),
        0..8,
    )
    .prop_map(|triples| {
        grants(
            &triples
                .iter()
                .map(|(module, sub_module, action)| (module.as_str(), *sub_module, *action))
                .collect::<Vec<_>>(),
        )
    })
}

fn allow_list_strategy() -> impl Strategy<Value = ModuleAllowList> {
    prop::collection::vec(
        prop::sample::select(vec!["hr.*", "finance", "assets.*", "approval", "*"]),
        0..4,
    )
    .prop_map(|values| allow_list(&values))
}

fn anchors_strategy() -> impl Strategy<Value = ScopeAnchors> {
    let project = ProjectId::new();
    let group = DepartmentId::new();
    (any::<bool>(), any::<bool>()).prop_map(move |(has_project, has_group)| ScopeAnchors {
        project_id: has_project.then_some(project),
        group_id: has_group.then_some(group),
    })
}

proptest! {
    #[test]
    fn all_scope_ignores_department_allow_list(
        allowed_modules in allow_list_strategy(),
        module in identifier_strategy(),
    ) {
        let context = context(
            DataScope::All,
            Grants::new(),
            allowed_modules,
            false,
            ScopeAnchors::default(),
        );
        prop_assert!(context.is_module_allowed(module.as_str()));
    }

    #[test]
    fn narrower_checks_imply_wider_checks(
        scope in data_scope_strategy(),
        grants in grants_strategy(),
        allowed_modules in allow_list_strategy(),
        module in identifier_strategy(),
        sub_module in prop::sample::select(vec!["employee", "flow", "fixed", "leave"]),
        action in prop::sample::select(vec!["view", "edit", "approve"]),
    ) {
        let context = context(scope, grants, allowed_modules, false, ScopeAnchors::default());
        let with_action = context.has_permission(module.as_str(), Some(sub_module), Some(action));
        let with_sub_module = context.has_permission(module.as_str(), Some(sub_module), None);
        let module_only = context.has_permission(module.as_str(), None, None);

        prop_assert!(!with_action || with_sub_module);
        prop_assert!(!with_sub_module || module_only);
    }

    #[test]
    fn own_data_is_always_accessible(
        scope in data_scope_strategy(),
        anchors in anchors_strategy(),
        manage in any::<bool>(),
    ) {
        let context = context(
            scope,
            Grants::new(),
            ModuleAllowList::unrestricted(),
            manage,
            anchors,
        );
        let own = context.snapshot().employee_scope();
        prop_assert!(context.can_access_data(&own));
    }

    #[test]
    fn self_approval_is_never_allowed(
        scope in data_scope_strategy(),
        anchors in anchors_strategy(),
    ) {
        let context = context(scope, Grants::new(), ModuleAllowList::unrestricted(), true, anchors);
        let own = context.snapshot().employee_scope();
        prop_assert!(!context.can_approve(&own));
    }

    #[test]
    fn approval_implies_data_access(
        scope in data_scope_strategy(),
        actor_anchors in anchors_strategy(),
        target_anchors in anchors_strategy(),
        manage in any::<bool>(),
    ) {
        let context = context(
            scope,
            Grants::new(),
            ModuleAllowList::unrestricted(),
            manage,
            actor_anchors,
        );
        let applicant = target(target_anchors);
        prop_assert!(!context.can_approve(&applicant) || context.can_access_data(&applicant));
    }
}
