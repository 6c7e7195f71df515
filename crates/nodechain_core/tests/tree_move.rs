use nodechain_core::{
    DestinationError, DropPosition, MemoryNodeStore, NewNode, Node, NodeId, NodeType, TreeEngine,
    TreeError, TreeEvent,
};

type Engine = TreeEngine<MemoryNodeStore>;

fn engine() -> Engine {
    TreeEngine::with_default_config(MemoryNodeStore::new())
}

fn ids(nodes: &[Node]) -> Vec<NodeId> {
    nodes.iter().map(|node| node.id).collect()
}

async fn append(engine: &Engine, parent: NodeId, node_type: NodeType, name: &str) -> NodeId {
    engine
        .append_child(parent, NewNode::new(node_type).with_name(name))
        .await
        .unwrap()
        .id
}

/// Root task with two task folders `a` and `b`; `a` holds four tasks, `b` two.
struct Fixture {
    engine: Engine,
    a: NodeId,
    b: NodeId,
    a_children: Vec<NodeId>,
    b_children: Vec<NodeId>,
}

async fn fixture() -> Fixture {
    let engine = engine();
    let root = engine
        .create_root(NewNode::new(NodeType::task()).with_name("root"))
        .await
        .unwrap()
        .id;
    let a = append(&engine, root, NodeType::task(), "a").await;
    let b = append(&engine, root, NodeType::task(), "b").await;
    let mut a_children = Vec::new();
    for name in ["a1", "a2", "a3", "a4"] {
        a_children.push(append(&engine, a, NodeType::task(), name).await);
    }
    let mut b_children = Vec::new();
    for name in ["b1", "b2"] {
        b_children.push(append(&engine, b, NodeType::task(), name).await);
    }
    Fixture {
        engine,
        a,
        b,
        a_children,
        b_children,
    }
}

#[tokio::test]
async fn moving_a_run_between_parents_keeps_its_order() {
    let f = fixture().await;
    let (a1, a2, a3, a4) = (f.a_children[0], f.a_children[1], f.a_children[2], f.a_children[3]);
    let (b1, b2) = (f.b_children[0], f.b_children[1]);

    // Caller order does not matter; chain order does.
    f.engine
        .move_nodes(&[a3, a2], Some(f.b), Some(b1), Some(b2))
        .await
        .unwrap();

    let b_chain = f.engine.check_chain(f.b).await.unwrap();
    assert_eq!(ids(&b_chain), vec![b1, a2, a3, b2]);

    let a_chain = f.engine.check_chain(f.a).await.unwrap();
    assert_eq!(ids(&a_chain), vec![a1, a4]);
    for node in &a_chain {
        for link in [node.prev_id, node.next_id].into_iter().flatten() {
            assert!(link != a2 && link != a3, "{} still links to a moved node", node.id);
        }
    }

    let moved = f.engine.require_node(a2).await.unwrap();
    assert_eq!(moved.parent_id, Some(f.b));
    assert_eq!(moved.name.as_deref(), Some("a2"));
}

#[tokio::test]
async fn moving_to_tail_and_head_of_another_parent() {
    let f = fixture().await;
    let (a1, a2, a3, a4) = (f.a_children[0], f.a_children[1], f.a_children[2], f.a_children[3]);
    let (b1, b2) = (f.b_children[0], f.b_children[1]);

    f.engine
        .move_nodes(&[a4], Some(f.b), Some(b2), None)
        .await
        .unwrap();
    f.engine
        .move_nodes(&[a1], Some(f.b), None, Some(b1))
        .await
        .unwrap();

    assert_eq!(ids(&f.engine.check_chain(f.b).await.unwrap()), vec![a1, b1, b2, a4]);
    assert_eq!(ids(&f.engine.check_chain(f.a).await.unwrap()), vec![a2, a3]);
}

#[tokio::test]
async fn scattered_selection_within_one_parent_lands_as_a_block() {
    let f = fixture().await;
    let (a1, a2, a3, a4) = (f.a_children[0], f.a_children[1], f.a_children[2], f.a_children[3]);

    f.engine
        .move_nodes(&[a1, a3], Some(f.a), Some(a4), None)
        .await
        .unwrap();

    assert_eq!(ids(&f.engine.check_chain(f.a).await.unwrap()), vec![a2, a4, a1, a3]);
}

#[tokio::test]
async fn moving_everything_into_an_empty_parent() {
    let f = fixture().await;
    let empty = append(&f.engine, f.b, NodeType::task(), "empty").await;

    f.engine
        .move_nodes(&f.a_children, Some(empty), None, None)
        .await
        .unwrap();

    assert_eq!(ids(&f.engine.check_chain(empty).await.unwrap()), f.a_children);
    assert!(f.engine.ordered_children(f.a).await.unwrap().is_empty());
}

#[tokio::test]
async fn splice_point_inside_selection_performs_zero_writes() {
    let f = fixture().await;
    let (a2, a3) = (f.a_children[1], f.a_children[2]);
    let writes = f.engine.store().write_count().unwrap();
    let before = f.engine.store().snapshot().unwrap();

    let err = f
        .engine
        .move_nodes(&[a2, a3], Some(f.a), Some(a3), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TreeError::InvalidDestination(DestinationError::SplicePointInSelection(id)) if id == a3
    ));
    assert_eq!(f.engine.store().write_count().unwrap(), writes);
    assert_eq!(f.engine.store().snapshot().unwrap(), before);
}

#[tokio::test]
async fn invalid_moves_are_rejected_before_writes() {
    let f = fixture().await;
    let (a1, a2) = (f.a_children[0], f.a_children[1]);
    let (b1, b2) = (f.b_children[0], f.b_children[1]);
    let page = append(&f.engine, f.a, NodeType::page(), "page").await;
    let writes = f.engine.store().write_count().unwrap();

    let err = f.engine.move_nodes(&[], Some(f.b), None, None).await.unwrap_err();
    assert!(matches!(err, TreeError::EmptySelection));

    let err = f.engine.move_nodes(&[a1], None, None, None).await.unwrap_err();
    assert!(matches!(err, TreeError::InvalidDestination(DestinationError::Root)));

    let err = f
        .engine
        .move_nodes(&[a1, b1], Some(f.b), Some(b2), None)
        .await
        .unwrap_err();
    assert!(matches!(err, TreeError::HeterogeneousSelection));

    let err = f
        .engine
        .move_nodes(&[a1, page], Some(f.b), Some(b2), None)
        .await
        .unwrap_err();
    assert!(matches!(err, TreeError::HeterogeneousSelection));

    let err = f
        .engine
        .move_nodes(&[a1], Some(page), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, TreeError::PlacementViolation { .. }));

    let err = f
        .engine
        .move_nodes(&[f.a], Some(a2), None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TreeError::InvalidDestination(DestinationError::Cycle { .. })
    ));

    let err = f
        .engine
        .move_nodes(&[a1], Some(f.b), Some(b2), Some(b1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TreeError::InvalidDestination(DestinationError::NotAdjacent { .. })
    ));

    let err = f
        .engine
        .move_nodes(&[a1], Some(f.b), Some(a2), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TreeError::InvalidDestination(DestinationError::ForeignSibling { .. })
    ));

    let missing = NodeId::new(999).unwrap();
    let err = f
        .engine
        .move_nodes(&[a1, missing], Some(f.b), Some(b2), None)
        .await
        .unwrap_err();
    assert!(matches!(err, TreeError::NodeNotFound(id) if id == missing));

    assert_eq!(f.engine.store().write_count().unwrap(), writes);
}

#[tokio::test]
async fn storage_failure_mid_move_stops_without_event() {
    let f = fixture().await;
    let a2 = f.a_children[1];
    let b2 = f.b_children[1];
    let mut events = f.engine.subscribe();
    let writes = f.engine.store().write_count().unwrap();
    f.engine.store().fail_after_writes(1).unwrap();

    let err = f
        .engine
        .move_nodes(&[a2], Some(f.b), Some(b2), None)
        .await
        .unwrap_err();

    assert!(matches!(err, TreeError::StorageFailure(_)));
    assert_eq!(f.engine.store().write_count().unwrap(), writes + 1);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn drop_targets_resolve_to_move_destinations() {
    let f = fixture().await;
    let (a1, a2, a3, a4) = (f.a_children[0], f.a_children[1], f.a_children[2], f.a_children[3]);
    let (b1, b2) = (f.b_children[0], f.b_children[1]);
    let mut events = f.engine.subscribe();

    let after_b1 = f.engine.drop_target(b1, DropPosition::After).await.unwrap();
    assert_eq!(after_b1.parent_id, Some(f.b));
    assert_eq!(after_b1.prev_id, Some(b1));
    assert_eq!(after_b1.next_id, Some(b2));
    f.engine.move_to(&[a1], after_b1).await.unwrap();
    assert_eq!(events.try_recv().unwrap(), TreeEvent::TreeChanged);

    let into_b = f.engine.drop_target(f.b, DropPosition::Into).await.unwrap();
    assert_eq!(into_b.next_id, Some(b1));
    f.engine.move_to(&[a2], into_b).await.unwrap();

    let before_b2 = f.engine.drop_target(b2, DropPosition::Before).await.unwrap();
    f.engine.move_to(&[a3], before_b2).await.unwrap();

    assert_eq!(
        ids(&f.engine.check_chain(f.b).await.unwrap()),
        vec![a2, b1, a1, a3, b2]
    );
    assert_eq!(ids(&f.engine.check_chain(f.a).await.unwrap()), vec![a4]);
}

#[tokio::test]
async fn detach_and_remove_heals_the_chain() {
    let f = fixture().await;
    let (a1, a2, a3, a4) = (f.a_children[0], f.a_children[1], f.a_children[2], f.a_children[3]);
    append(&f.engine, a2, NodeType::document(), "doc").await;

    let removed = f.engine.detach_and_remove(a2).await.unwrap();

    assert_eq!(removed, 2);
    assert_eq!(ids(&f.engine.check_chain(f.a).await.unwrap()), vec![a1, a3, a4]);
    assert!(f.engine.get_node(a2).await.unwrap().is_none());
}
