mod common;

use std::time::Duration;

use common::*;
use component_store::{
    key_path, ComponentRuntime, ComponentStore, Event, EventKind, Mutation, ResourceState,
    TaskError,
};

#[tokio::test]
async fn action_mutates_state_and_records_event() {
    let runtime = runtime();
    let store = ComponentStore::<Counter>::new(CounterState::default(), &runtime);

    store.process_action(CounterAction::Increment).await;
    store.process_action(CounterAction::Increment).await;
    store.process_action(CounterAction::Decrement).await;

    assert_eq!(store.state().count, 1);
    assert_eq!(store.event_depth(), 0);

    let events = runtime.events().events_for(store.path(), false);
    let actions: Vec<&Event> = events
        .iter()
        .filter(|event| matches!(event.kind, EventKind::Action(_)))
        .collect();
    assert_eq!(actions.len(), 3);
    assert_eq!(actions[0].mutations.len(), 1);
    assert_eq!(actions[0].mutations[0].property, "count");
    assert_eq!(actions[0].depth, 0);

    let mutation = events
        .iter()
        .find(|event| matches!(event.kind, EventKind::Mutation(_)))
        .expect("mutation event");
    assert_eq!(mutation.depth, 1);
}

#[tokio::test]
async fn equal_binding_write_emits_nothing() {
    let runtime = runtime();
    let store = ComponentStore::<Counter>::new(CounterState::default(), &runtime);
    let label = key_path!(CounterState, label);

    store.set_binding(&label, "a".to_string()).await;
    store.set_binding(&label, "a".to_string()).await;

    let bindings = runtime
        .events()
        .events()
        .into_iter()
        .filter(|event| matches!(event.kind, EventKind::Binding(_)))
        .count();
    assert_eq!(bindings, 1);
    assert_eq!(store.state().label, "a");
}

#[tokio::test]
async fn child_output_becomes_parent_input() {
    let runtime = runtime();
    let parent = ComponentStore::<Parent>::new(ParentState::default(), &runtime);
    let counter = counter(&parent);

    counter.send_and_wait(CounterAction::Increment).await;
    counter.send_and_wait(CounterAction::Finish).await;
    assert!(parent.settle(SETTLE).await);

    let state = parent.state();
    assert!(state.done);
    assert_eq!(state.finished_with, Some(1));
    assert_eq!(state.counter.count, 1);
}

fn routed_inputs(runtime: &ComponentRuntime, parent: &ComponentStore<Parent>) -> usize {
    runtime
        .events()
        .events_for(parent.path(), false)
        .into_iter()
        .filter(|event| event.input::<ParentInput>().is_some())
        .count()
}

#[tokio::test]
async fn repeated_equal_output_is_routed_once_per_action() {
    let runtime = runtime();
    let parent = ComponentStore::<Parent>::new(ParentState::default(), &runtime);
    let counter = counter(&parent);

    counter.send_and_wait(CounterAction::FinishTwice).await;
    assert!(parent.settle(SETTLE).await);

    assert_eq!(routed_inputs(&runtime, &parent), 1);
}

#[tokio::test]
async fn equal_output_from_a_later_action_is_routed_again() {
    let runtime = runtime();
    let parent = ComponentStore::<Parent>::new(ParentState::default(), &runtime);
    let counter = counter(&parent);

    counter.send_and_wait(CounterAction::Finish).await;
    assert!(parent.settle(SETTLE).await);
    counter.send_and_wait(CounterAction::Finish).await;
    assert!(parent.settle(SETTLE).await);

    assert_eq!(routed_inputs(&runtime, &parent), 2);
}

#[tokio::test]
async fn same_connection_resolves_to_cached_child() {
    let parent = ComponentStore::<Parent>::new(ParentState::default(), &runtime());

    let first = counter(&parent);
    let second = counter(&parent);

    assert!(first.store().ptr_eq(second.store()));
    assert_eq!(parent.connection_count(), 1);
    assert_eq!(first.store().path().string(), "Parent.Counter");
}

#[tokio::test]
async fn scoped_child_reads_and_writes_parent_state() {
    let parent = ComponentStore::<Parent>::new(ParentState::default(), &runtime());
    let counter = counter(&parent);
    let mut updates = counter.subscribe();

    counter.send_and_wait(CounterAction::Increment).await;
    assert_eq!(parent.state().counter.count, 1);

    parent.update_state(|state| state.counter.count = 10);
    assert_eq!(counter.state().count, 10);
    assert!(updates.has_changed().unwrap());
}

#[tokio::test]
async fn presented_route_can_dismiss_itself() {
    let runtime = runtime();
    let parent = ComponentStore::<Parent>::new(ParentState::default(), &runtime);

    parent
        .process_action(ParentAction::ShowDetail("Notes".to_string()))
        .await;
    let route = parent.route().and_then(|route| detail_route(&route)).expect("route");
    let detail = route.store();
    detail
        .process_action(DetailAction::Rename("Tasks".to_string()))
        .await;
    assert_eq!(route.state().title, "Tasks");

    detail.process_action(DetailAction::Close).await;
    assert!(parent.settle(SETTLE).await);

    assert!(parent.route().is_none());
    assert!(detail.is_disposed());
    assert_eq!(parent.connection_count(), 0);
}

#[tokio::test]
async fn dismissing_without_route_emits_nothing() {
    let runtime = runtime();
    let parent = ComponentStore::<Parent>::new(ParentState::default(), &runtime);

    parent.process_action(ParentAction::CloseDetail).await;

    assert!(runtime
        .events()
        .events()
        .iter()
        .all(|event| !matches!(event.kind, EventKind::DismissRoute)));
}

#[tokio::test]
async fn newer_load_replaces_running_load() {
    let runtime = runtime();
    let store = ComponentStore::<Profile>::new(ProfileState::default(), &runtime);

    let slow = store.send(ProfileAction::LoadAfter(
        "first".to_string(),
        Duration::from_millis(500),
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(store.is_task_running("profile"));

    store
        .process_action(ProfileAction::LoadAfter(
            "second".to_string(),
            Duration::from_millis(10),
        ))
        .await;
    slow.await.unwrap();

    let profile = store.state().profile;
    assert_eq!(profile.content.as_deref(), Some("second"));
    assert!(!profile.is_loading);

    let tasks: Vec<String> = runtime
        .events()
        .events()
        .iter()
        .filter_map(|event| event.task().map(|task| task.name.clone()))
        .collect();
    assert_eq!(tasks, vec!["profile".to_string()]);
}

#[tokio::test]
async fn dispose_cancels_running_tasks_silently() {
    let runtime = runtime();
    let store = ComponentStore::<Profile>::new(ProfileState::default(), &runtime);

    store.send(ProfileAction::LoadAfter(
        "late".to_string(),
        Duration::from_millis(300),
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;
    store.dispose();
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(!store.is_task_running("profile"));
    assert!(store.state().profile.content.is_none());
    assert!(runtime
        .events()
        .events()
        .iter()
        .all(|event| event.task().is_none()));
    assert!(!runtime.graph().contains(store.path()));
}

#[tokio::test]
async fn failed_load_sets_error_and_clears_loading() {
    let store = ComponentStore::<Profile>::new(ProfileState::default(), &runtime());

    store
        .process_action(ProfileAction::Load(Err("offline".to_string())))
        .await;
    let profile = store.state().profile;
    assert_eq!(profile.error.map(|error| error.to_string()), Some("offline".to_string()));
    assert!(!profile.is_loading);

    store
        .process_action(ProfileAction::Load(Ok("Ada".to_string())))
        .await;
    let profile = store.state().profile;
    assert_eq!(profile.content.as_deref(), Some("Ada"));
    assert!(profile.error.is_none());
}

#[tokio::test]
async fn increment_records_one_count_mutation() {
    let runtime = runtime();
    let store = ComponentStore::<Counter>::new(CounterState::default(), &runtime);

    store.process_action(CounterAction::Increment).await;

    let mutations: Vec<Mutation> = runtime
        .events()
        .events()
        .iter()
        .filter_map(|event| event.mutation().cloned())
        .collect();
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0].property, "count");
    assert_eq!(mutations[0].old_value::<i32>(), Some(&0));
    assert_eq!(mutations[0].value::<i32>(), Some(&1));
    assert_eq!(store.state().count, 1);
}

#[tokio::test]
async fn resource_load_mutates_in_order() {
    let runtime = runtime();
    let store = ComponentStore::<Profile>::new(ProfileState::default(), &runtime);

    store
        .process_action(ProfileAction::Load(Ok("42".to_string())))
        .await;

    let events = runtime.events().events();
    let properties: Vec<String> = events
        .iter()
        .filter_map(|event| event.mutation().map(|mutation| mutation.property.clone()))
        .collect();
    assert_eq!(
        properties,
        vec!["profile.is_loading", "profile.content", "profile.is_loading"]
    );
    let tasks: Vec<bool> = events
        .iter()
        .filter_map(|event| event.task().map(|task| task.is_success()))
        .collect();
    assert_eq!(tasks, vec![true]);
    assert_eq!(
        store.state().profile.state(),
        ResourceState::Content("42".to_string())
    );
}

#[tokio::test]
async fn dispose_cancels_anonymous_task() {
    let runtime = runtime();
    let store = ComponentStore::<Counter>::new(CounterState::default(), &runtime);

    let worker = store.clone();
    let handle = tokio::spawn(async move {
        worker
            .task("tick", async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok(1)
            })
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.running_task_count(), 1);
    assert!(store.is_task_running("tick"));

    store.dispose();
    let result = handle.await.unwrap();

    assert!(matches!(result, Err(TaskError::Cancelled { .. })));
    assert_eq!(store.running_task_count(), 0);
    assert!(runtime
        .events()
        .events()
        .iter()
        .all(|event| event.task().is_none()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_sends_apply_every_write() {
    let runtime = runtime();
    let store = ComponentStore::<Tally>::new(TallyState::default(), &runtime);

    for _ in 0..1000 {
        store.send(TallyAction::BumpA);
        store.send(TallyAction::BumpB);
    }
    assert!(store.settle(Duration::from_secs(10)).await);

    assert_eq!(store.state(), TallyState { a: 1000, b: 1000 });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_actions_keep_their_own_mutations() {
    let runtime = runtime();
    let store = ComponentStore::<Tally>::new(TallyState::default(), &runtime);

    for _ in 0..200 {
        store.send(TallyAction::BumpBoth);
    }
    assert!(store.settle(Duration::from_secs(10)).await);
    assert_eq!(store.state(), TallyState { a: 200, b: 200 });

    let actions: Vec<Event> = runtime
        .events()
        .events()
        .into_iter()
        .filter(|event| event.action::<TallyAction>().is_some())
        .collect();
    assert_eq!(actions.len(), 200);
    for action in &actions {
        let properties: Vec<&str> = action
            .mutations
            .iter()
            .map(|mutation| mutation.property.as_str())
            .collect();
        assert_eq!(properties, vec!["a", "b"]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scoped_writes_from_parallel_children_are_not_lost() {
    let runtime = runtime();
    let parent = ComponentStore::<Parent>::new(ParentState::default(), &runtime);
    let counter = counter(&parent);

    for _ in 0..500 {
        counter.store().send(CounterAction::Increment);
        parent.send_input(ParentInput::ChildFinished(1));
    }
    assert!(parent.settle(Duration::from_secs(10)).await);

    assert!(parent.state().done);
    assert_eq!(parent.state().counter.count, 500);
    assert_eq!(counter.state().count, 500);
}
