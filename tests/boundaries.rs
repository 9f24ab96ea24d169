//! Suspense and error boundaries.

mod common;

use std::cell::RefCell;

use common::{log, mount, take_log};
use spark_fiber::{
    Component, ComponentCx, ComponentError, ErrorInfo, FiberError, FunctionalComponent, HookCx, Props, Record,
    RenderResult, Resource, State, Unbounded, UpdateType, WorkStatus, class, element, functional, suspense, text,
};

thread_local! {
    static USER: RefCell<Resource<String>> = RefCell::new(Resource::new());
    static AVATAR: RefCell<Resource<String>> = RefCell::new(Resource::new());
}

struct Profile;

impl FunctionalComponent for Profile {
    fn render(_props: &Props, _cx: &mut HookCx<'_>) -> RenderResult {
        let name = USER.with(|user| user.borrow().read())?;
        Ok(Some(text(format!("hello {name}")).into()))
    }
}

fn resolve_user(name: &str) {
    USER.with(|user| user.borrow().resolve(name.to_string()));
}

// =============================================================================
// Suspense
// =============================================================================

#[test]
fn test_suspense_shows_fallback_until_resolved() {
    let mut root = mount();
    root.render(
        element("main")
            .text("header")
            .child(suspense(text("loading"), functional::<Profile>(Record::new()))),
    )
    .expect("mount");

    assert_eq!(root.host().markup(), "<main>headerloading</main>");
    assert!(!root.has_work(), "nothing to do until the value settles");

    resolve_user("Ada");
    assert!(root.has_work(), "settling requests a retry");
    root.flush().expect("retry");

    assert_eq!(root.host().markup(), "<main>headerhello Ada</main>");
}

#[test]
fn test_suspending_outside_a_boundary_fails_the_pass() {
    let mut root = mount();
    root.render(text("before")).expect("mount");

    let result = root.render(functional::<Profile>(Record::new()));

    assert!(
        matches!(
            result,
            Err(FiberError::SuspendedOutsideBoundary { component: "Profile" })
        ),
        "got {result:?}"
    );
    assert_eq!(root.host().markup(), "before", "committed tree is untouched");
    assert!(!root.is_rendering());
}

struct Name;

impl FunctionalComponent for Name {
    fn render(_props: &Props, _cx: &mut HookCx<'_>) -> RenderResult {
        log("render Name");
        let name = USER.with(|user| user.borrow().read())?;
        Ok(Some(text(name).into()))
    }
}

struct Avatar;

impl FunctionalComponent for Avatar {
    fn render(_props: &Props, _cx: &mut HookCx<'_>) -> RenderResult {
        log("render Avatar");
        let avatar = AVATAR.with(|avatar| avatar.borrow().read())?;
        Ok(Some(text(format!(" [{avatar}]")).into()))
    }
}

#[test]
fn test_retry_renders_once_after_values_settle() {
    let mut root = mount();
    root.render(suspense(
        text("loading"),
        element("p")
            .child(functional::<Name>(Record::new()))
            .child(functional::<Avatar>(Record::new())),
    ))
    .expect("mount");
    assert_eq!(root.host().markup(), "loading");
    assert_eq!(take_log(), ["render Name"], "the walk stops at the first suspension");

    AVATAR.with(|avatar| avatar.borrow().resolve("cat".to_string()));
    assert!(!root.has_work(), "the boundary never waited on the avatar");

    resolve_user("Ada");
    assert!(root.has_work());
    assert_eq!(
        root.tick(&mut Unbounded).expect("retry"),
        WorkStatus::Committed(UpdateType::Sync)
    );
    assert_eq!(root.tick(&mut Unbounded).expect("idle"), WorkStatus::Idle);

    assert_eq!(root.host().markup(), "<p>Ada [cat]</p>");
    assert_eq!(
        take_log(),
        ["render Name", "render Avatar"],
        "one retry render each"
    );
}

// =============================================================================
// Error Boundaries
// =============================================================================

struct Guard;

impl Component for Guard {
    fn new(_props: &Props) -> Self {
        Guard
    }

    fn catches_errors(&self) -> bool {
        true
    }

    fn derive_state_from_error(&self, error: &ComponentError) -> Option<State> {
        Some(Record::new().with("error", error.message()))
    }

    fn render(&self, cx: &ComponentCx<'_>) -> RenderResult {
        match cx.state().str("error") {
            Some(message) => Ok(Some(text(format!("failed: {message}")).into())),
            None => Ok(cx.props().node("children")),
        }
    }

    fn on_catch_error(&mut self, _cx: &ComponentCx<'_>, error: &ComponentError, info: &ErrorInfo) {
        log(format!(
            "caught {} (stack has Bomb: {})",
            error.message(),
            info.component_stack.contains("at Bomb")
        ));
    }
}

struct Bomb;

impl Component for Bomb {
    fn new(_props: &Props) -> Self {
        Bomb
    }

    fn render(&self, cx: &ComponentCx<'_>) -> RenderResult {
        if cx.props().bool("explode") == Some(false) {
            return Ok(Some(text("fine").into()));
        }
        Err("boom".into())
    }

    fn on_mount(&mut self, _cx: &ComponentCx<'_>) {
        log("mount Bomb");
    }

    fn on_unmount(&mut self, _cx: &ComponentCx<'_>) {
        log("unmount Bomb");
    }
}

fn guarded(explode: bool) -> spark_fiber::Node {
    class::<Guard>(Record::new().with(
        "children",
        class::<Bomb>(Record::new().with("explode", explode)),
    ))
}

#[test]
fn test_error_boundary_renders_fallback() {
    let mut root = mount();
    root.render(guarded(true)).expect("boundary handles the error");

    assert_eq!(root.host().markup(), "failed: boom");
    assert_eq!(take_log(), ["caught boom (stack has Bomb: true)"]);
}

#[test]
fn test_error_after_mount_replaces_content() {
    let mut root = mount();
    root.render(guarded(false)).expect("mount");
    assert_eq!(root.host().markup(), "fine");
    assert_eq!(take_log(), ["mount Bomb"]);

    root.render(guarded(true)).expect("update");
    assert_eq!(root.host().markup(), "failed: boom");
    assert_eq!(
        take_log(),
        ["unmount Bomb", "caught boom (stack has Bomb: true)"]
    );
}

#[test]
fn test_unhandled_error_is_returned() {
    let mut root = mount();
    let result = root.render(class::<Bomb>(Record::new()));

    let Err(error) = result else {
        panic!("render should fail");
    };
    assert!(matches!(&error, FiberError::Unhandled { component: "Bomb", component_stack, .. }
        if component_stack.contains("at Bomb")));
    assert_eq!(
        error.component_error().map(ComponentError::message),
        Some("boom")
    );
    assert_eq!(root.host().markup(), "");
}

/// Keeps rendering its children after catching.
struct Twice;

impl Component for Twice {
    fn new(_props: &Props) -> Self {
        Twice
    }

    fn catches_errors(&self) -> bool {
        true
    }

    fn derive_state_from_error(&self, error: &ComponentError) -> Option<State> {
        Some(Record::new().with("error", error.message()))
    }

    fn render(&self, cx: &ComponentCx<'_>) -> RenderResult {
        Ok(cx.props().node("children"))
    }
}

struct Flaky;

impl Component for Flaky {
    fn new(_props: &Props) -> Self {
        Flaky
    }

    fn render(&self, _cx: &ComponentCx<'_>) -> RenderResult {
        log("render Flaky");
        Err("first".into())
    }
}

#[test]
fn test_second_error_at_the_same_boundary_is_unhandled() {
    let mut root = mount();
    let result = root.render(class::<Twice>(
        Record::new().with("children", class::<Flaky>(Record::new())),
    ));

    let Err(error) = result else {
        panic!("render should fail");
    };
    assert!(
        matches!(&error, FiberError::Unhandled { component: "Flaky", .. }),
        "got {error:?}"
    );
    assert_eq!(
        error.component_error().map(ComponentError::message),
        Some("first")
    );
    assert_eq!(take_log(), ["render Flaky", "render Flaky"]);
    assert_eq!(root.host().markup(), "");
    assert!(!root.is_rendering());
}

#[test]
fn test_rejected_resource_reaches_error_boundary() {
    let mut root = mount();
    root.render(class::<Guard>(Record::new().with(
        "children",
        suspense(text("loading"), functional::<Profile>(Record::new())),
    )))
    .expect("mount");
    assert_eq!(root.host().markup(), "loading");

    USER.with(|user| user.borrow().reject("offline"));
    root.flush().expect("retry");

    assert_eq!(root.host().markup(), "failed: offline");
    assert_eq!(take_log(), ["caught offline (stack has Bomb: false)"]);
}
