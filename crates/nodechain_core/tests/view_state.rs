use nodechain_core::{MemoryNodeStore, NewNode, NodeId, NodeType, TreeEngine, TreeEvent, ViewState};

async fn engine_with_siblings() -> (TreeEngine<MemoryNodeStore>, NodeId, Vec<NodeId>) {
    let engine = TreeEngine::with_default_config(MemoryNodeStore::new());
    let root = engine
        .create_root(NewNode::new(NodeType::task()))
        .await
        .unwrap();
    let mut children = Vec::new();
    for _ in 0..5 {
        children.push(
            engine
                .append_child(root.id, NewNode::new(NodeType::task()))
                .await
                .unwrap()
                .id,
        );
    }
    (engine, root.id, children)
}

#[tokio::test]
async fn range_selection_follows_chain_order_in_both_directions() {
    let (engine, _, children) = engine_with_siblings().await;
    let mut view = ViewState::new();

    view.select_range(&engine, children[1], children[3])
        .await
        .unwrap();
    assert_eq!(view.selected(), &children[1..=3]);

    view.select_range(&engine, children[4], children[2])
        .await
        .unwrap();
    assert_eq!(view.selected(), &children[2..=4]);
}

#[tokio::test]
async fn range_selection_across_parents_keeps_only_target() {
    let (engine, _, children) = engine_with_siblings().await;
    let nested = engine
        .append_child(children[0], NewNode::new(NodeType::document()))
        .await
        .unwrap();
    let mut view = ViewState::new();

    view.select_range(&engine, children[2], nested.id)
        .await
        .unwrap();
    assert_eq!(view.selected(), &[nested.id]);
}

#[tokio::test]
async fn view_state_events_share_the_engine_channel() {
    let (engine, _, children) = engine_with_siblings().await;
    let mut events = engine.subscribe();
    let mut view = ViewState::with_events(engine.event_sender());

    view.set_expanded([children[0]]);
    // Rejected mutations stay silent.
    engine
        .move_nodes(&[children[0]], None, None, None)
        .await
        .unwrap_err();
    view.set_checked(children.iter().copied());

    assert_eq!(events.try_recv().unwrap(), TreeEvent::SelectionChanged);
    assert_eq!(events.try_recv().unwrap(), TreeEvent::SelectionChanged);
    assert!(events.try_recv().is_err());
    assert_eq!(view.expanded(), &[children[0]]);
    assert_eq!(view.checked().len(), 5);
}
